//! Page count and page geometry lookups

use lopdf::{Dictionary, Document, Object, ObjectId};
use crate::error::{Error, Result};
use crate::layout::PageGeometry;

/// Attributes a page may inherit from its ancestor Pages nodes
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Page rectangle taken from the MediaBox
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Lower-left corner of the MediaBox
    pub origin: (f32, f32),
    pub geometry: PageGeometry,
}

/// Count pages by reading the Count field from the Pages dictionary
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog = doc.catalog()?;

    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::General("No Pages reference in catalog".to_string()))?;

    let pages_dict = doc
        .get_object(pages_id)
        .and_then(Object::as_dict)
        .map_err(|_| Error::General("Pages is not a dictionary".to_string()))?;

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) if *n >= 0 => Ok(*n as usize),
        Ok(_) => Err(Error::General("Count is not a non-negative integer".to_string())),
        Err(_) => Err(Error::General("No Count in Pages".to_string())),
    }
}

/// Count the pages of an in-memory PDF
pub fn count_pages(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)?;
    count_pages_from_catalog(&doc)
}

/// Look up an attribute on a page, falling back to its ancestors
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        // Guard against Parent cycles in malformed files
        if depth > 64 {
            return None;
        }
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

/// Resolve a reference to a dictionary, or return a direct dictionary as-is
pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Reference(id) => doc.get_object(*id).and_then(Object::as_dict).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

pub(crate) fn obj_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

/// Read the MediaBox of a page, honouring inheritance
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let raw = inherited_attribute(doc, page_id, b"MediaBox").ok_or(Error::MissingMediaBox)?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id)?,
        other => other,
    };
    let arr = resolved.as_array().map_err(|_| Error::MissingMediaBox)?;
    if arr.len() != 4 {
        return Err(Error::MissingMediaBox);
    }
    let nums: Vec<f32> = arr.iter().filter_map(obj_to_f32).collect();
    if nums.len() != 4 {
        return Err(Error::MissingMediaBox);
    }

    let (llx, urx) = (nums[0].min(nums[2]), nums[0].max(nums[2]));
    let (lly, ury) = (nums[1].min(nums[3]), nums[1].max(nums[3]));

    Ok(PageBox {
        origin: (llx, lly),
        geometry: PageGeometry::new(urx - llx, ury - lly),
    })
}

/// Geometry of every page, in page order
pub fn page_geometries(doc: &Document) -> Result<Vec<PageGeometry>> {
    doc.get_pages()
        .values()
        .map(|&page_id| page_box(doc, page_id).map(|b| b.geometry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn two_level_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_a = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let page_b = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![10.into(), 20.into(), 310.into(), 420.into()],
        });
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_a.into(), page_b.into()],
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_inherited_media_box() {
        let doc = two_level_document();
        let geometries = page_geometries(&doc).unwrap();
        assert_eq!(geometries, vec![PageGeometry::letter(), PageGeometry::new(300.0, 400.0)]);
    }

    #[test]
    fn test_page_box_origin() {
        let doc = two_level_document();
        let pages = doc.get_pages();
        let page_b = pages[&2];
        let pb = page_box(&doc, page_b).unwrap();
        assert_eq!(pb.origin, (10.0, 20.0));
    }

    #[test]
    fn test_count_pages_from_bytes() {
        let mut doc = two_level_document();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        assert_eq!(count_pages(&bytes).unwrap(), 2);
    }

    #[test]
    fn test_count_pages_garbage() {
        assert!(count_pages(b"not a pdf").is_err());
    }

    #[test]
    fn test_missing_media_box() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert!(matches!(page_box(&doc, page_id), Err(Error::MissingMediaBox)));
    }
}
