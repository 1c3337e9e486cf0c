//! Stamping watermark overlays onto the pages of a document
//!
//! Each distinct page geometry gets one overlay, embedded once as a Form
//! XObject and drawn on every page of that size. The host page's own
//! content is wrapped in `q ... Q` first so whatever graphics state it
//! leaves behind cannot move or scale the overlay.

use std::collections::HashMap;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};
use crate::error::{Error, Result};
use crate::layout::PageGeometry;
use super::metadata::{inherited_attribute, page_box, resolve_dict};
use super::watermark::{tile_with_style, OverlayPage, WatermarkStyle};

/// Preferred XObject resource name for the overlay
const OVERLAY_NAME: &str = "WmOverlay";

/// A page kept without a watermark, and why
#[derive(Debug)]
pub struct PageFallback {
    /// 1-based page number
    pub page_number: u32,
    pub reason: Error,
}

/// What a stamping pass did
#[derive(Debug, Default)]
pub struct StampReport {
    pub watermarked_pages: usize,
    pub fallbacks: Vec<PageFallback>,
    /// Number of distinct geometries an overlay was tiled for
    pub overlays_generated: usize,
}

/// Overlays and embedded forms shared between pages of the same size
#[derive(Default)]
struct OverlayCache {
    overlays: HashMap<(u32, u32), OverlayPage>,
    forms: HashMap<((u32, u32), (u32, u32)), ObjectId>,
}

impl OverlayCache {
    fn form_for(
        &mut self,
        doc: &mut Document,
        text: &str,
        style: &WatermarkStyle,
        geometry: PageGeometry,
        origin: (f32, f32),
    ) -> Result<ObjectId> {
        let origin_key = (origin.0.to_bits(), origin.1.to_bits());
        if let Some(&id) = self.forms.get(&(geometry.key(), origin_key)) {
            return Ok(id);
        }

        if !self.overlays.contains_key(&geometry.key()) {
            let overlay = tile_with_style(text, geometry, style)?;
            debug!(width = geometry.width, height = geometry.height, "generated watermark overlay");
            self.overlays.insert(geometry.key(), overlay);
        }

        let form = self.overlays[&geometry.key()].to_form_xobject(origin);
        let id = doc.add_object(form);
        self.forms.insert((geometry.key(), origin_key), id);
        Ok(id)
    }
}

/// Stamp `text` onto every page of `doc`.
///
/// A page that cannot be stamped is left exactly as it was and reported in
/// [`StampReport::fallbacks`]; the other pages are still processed.
pub fn stamp_watermark(doc: &mut Document, text: &str, style: &WatermarkStyle) -> StampReport {
    let mut report = StampReport::default();
    let mut cache = OverlayCache::default();

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();

    for (page_number, page_id) in pages {
        match stamp_page(doc, page_id, text, style, &mut cache) {
            Ok(()) => report.watermarked_pages += 1,
            Err(reason) => {
                warn!(page = page_number, error = %reason, "keeping page without watermark");
                report.fallbacks.push(PageFallback { page_number, reason });
            }
        }
    }

    report.overlays_generated = cache.overlays.len();
    report
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    text: &str,
    style: &WatermarkStyle,
    cache: &mut OverlayCache,
) -> Result<()> {
    // Everything fallible happens before the page is touched
    let bounds = page_box(doc, page_id)?;
    let contents = page_content_refs(doc, page_id)?;
    let mut resources = page_resources(doc, page_id);
    let form_id = cache.form_for(doc, text, style, bounds.geometry, bounds.origin)?;

    let name = add_xobject_to_resources(doc, &mut resources, form_id);

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let draw = format!("\nQ\nq /{} Do Q\n", name);
    let draw_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));

    let mut new_contents = Vec::with_capacity(contents.len() + 2);
    new_contents.push(Object::Reference(open_id));
    new_contents.extend(contents);
    new_contents.push(Object::Reference(draw_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));
    page_dict.set("Contents", Object::Array(new_contents));

    Ok(())
}

/// Content stream references of a page, as a flat list
fn page_content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_object(page_id)?.as_dict()?;

    let refs = match page_dict.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        Ok(_) => {
            return Err(Error::General("Page Contents is neither a stream nor an array".to_string()));
        }
        // A blank page; the overlay is its only content
        Err(_) => Vec::new(),
    };

    Ok(refs)
}

/// The page's effective Resources as an owned dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .and_then(|res| resolve_dict(doc, res))
        .cloned()
        .unwrap_or_default()
}

/// Register `form_id` in the XObject subdictionary, returning the name used
fn add_xobject_to_resources(doc: &Document, resources: &mut Dictionary, form_id: ObjectId) -> String {
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve_dict(doc, x))
        .cloned()
        .unwrap_or_default();

    let mut name = OVERLAY_NAME.to_string();
    let mut suffix = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{}{}", OVERLAY_NAME, suffix);
        suffix += 1;
    }

    xobjects.set(name.as_bytes().to_vec(), Object::Reference(form_id));
    resources.set("XObject", Object::Dictionary(xobjects));
    name
}
