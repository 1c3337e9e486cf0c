//! Diagonal tiled text watermark
//!
//! The overlay for a page is a grid of text tiles in a frame rotated about
//! the page center. Each tile is drawn twice: a faint white halo shifted by
//! one unit, then a slightly stronger black pass, so the text stays readable
//! on both dark and light page content.

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use crate::error::{Error, Result};
use crate::layout::PageGeometry;
use super::font::{encode_win_ansi, escape_pdf_string, text_width, BASE_FONT};
use super::merge::save_to_bytes;

/// Resource names used inside the overlay content stream
const FONT_NAME: &str = "WmF1";
const HALO_STATE: &str = "WmHalo";
const INK_STATE: &str = "WmInk";

/// Watermark text requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    pub text: String,
    pub enabled: bool,
}

impl WatermarkSpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), enabled: true }
    }

    /// True when an overlay pass should run
    pub fn is_active(&self) -> bool {
        self.enabled && !self.text.trim().is_empty()
    }
}

/// Visual parameters of the tiling.
///
/// Every page of one document must be stamped with the same style.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    /// Font size in points
    pub font_size: f64,
    /// Rotation of the tiling frame from the page's horizontal axis
    pub angle_degrees: f64,
    /// Gap added to the text width to get the horizontal step
    pub horizontal_margin: f64,
    /// Distance between rows
    pub vertical_step: f64,
    /// Fill opacity of the white halo pass
    pub halo_opacity: f32,
    /// Fill opacity of the black pass
    pub ink_opacity: f32,
    /// Offset of the halo pass from the tile position
    pub halo_offset: (f64, f64),
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size: 40.0,
            angle_degrees: 35.0,
            horizontal_margin: 120.0,
            vertical_step: 160.0,
            halo_opacity: 0.25,
            ink_opacity: 0.30,
            halo_offset: (1.0, -1.0),
        }
    }
}

impl WatermarkStyle {
    fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.font_size) || !positive(self.vertical_step) || !self.horizontal_margin.is_finite() {
            return Err(Error::General(format!("Invalid watermark style: {:?}", self)));
        }
        Ok(())
    }
}

/// A page carrying only the watermark tiling
#[derive(Debug, Clone)]
pub struct OverlayPage {
    pub geometry: PageGeometry,
    /// Content stream operators
    pub content: Vec<u8>,
    /// Font and graphics states referenced by `content`
    pub resources: Dictionary,
}

impl OverlayPage {
    /// Standalone single-page PDF of exactly the overlay geometry
    pub fn to_document(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content_id = doc.add_object(Stream::new(dictionary! {}, self.content.clone()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(self.geometry.width),
                Object::Real(self.geometry.height),
            ],
            "Resources" => self.resources.clone(),
            "Contents" => content_id,
        });

        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Serialized standalone PDF
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        save_to_bytes(&mut self.to_document())
    }

    /// Form XObject drawing this overlay on a page whose MediaBox starts at `origin`
    pub fn to_form_xobject(&self, origin: (f32, f32)) -> Stream {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"XObject".to_vec()));
        dict.set("Subtype", Object::Name(b"Form".to_vec()));
        dict.set("FormType", Object::Integer(1));
        dict.set("BBox", Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(self.geometry.width),
            Object::Real(self.geometry.height),
        ]));
        dict.set("Matrix", Object::Array(vec![
            Object::Integer(1),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(1),
            Object::Real(origin.0),
            Object::Real(origin.1),
        ]));
        dict.set("Resources", Object::Dictionary(self.resources.clone()));

        Stream::new(dict, self.content.clone())
    }
}

/// Build the overlay for a `width` × `height` page with the default style
pub fn tile(text: &str, width: f32, height: f32) -> Result<OverlayPage> {
    tile_with_style(text, PageGeometry::new(width, height), &WatermarkStyle::default())
}

/// Build the overlay for a page of `geometry`
pub fn tile_with_style(text: &str, geometry: PageGeometry, style: &WatermarkStyle) -> Result<OverlayPage> {
    if !geometry.is_valid() {
        return Err(Error::InvalidGeometry { width: geometry.width, height: geometry.height });
    }
    style.validate()?;

    let encoded = encode_win_ansi(text);
    let literal = escape_pdf_string(&encoded);
    let measured = text_width(&encoded, style.font_size);

    let step_x = measured + style.horizontal_margin;
    let step_y = style.vertical_step;
    if !(step_x.is_finite() && step_x > 0.0) {
        return Err(Error::General(format!("Watermark tile step is not positive: {}", step_x)));
    }

    let radius = geometry.coverage_radius();
    let (cx, cy) = geometry.center();
    let theta = style.angle_degrees.to_radians();
    let (cos, sin) = (theta.cos(), theta.sin());
    let font_size = num(style.font_size);
    let (halo_dx, halo_dy) = style.halo_offset;

    let columns = (2.0 * radius / step_x).floor() as usize;
    let rows = (2.0 * radius / step_y).floor() as usize;

    // Frame centered on the page, rotated about its center
    let frame = format!(
        "q\n1 0 0 1 {} {} cm\n{} {} {} {} 0 0 cm\n",
        num(cx), num(cy), num(cos), num(sin), num(-sin), num(cos)
    );
    let mut content: Vec<u8> = frame.into_bytes();

    for row in 0..=rows {
        let y = -radius + row as f64 * step_y;
        for column in 0..=columns {
            // Center-anchored: the tile position is the middle of the text
            let x = -radius + column as f64 * step_x - measured / 2.0;

            push_text(&mut content, HALO_STATE, "1 g", &font_size, x + halo_dx, y + halo_dy, &literal);
            push_text(&mut content, INK_STATE, "0 g", &font_size, x, y, &literal);
        }
    }

    content.extend_from_slice(b"Q\n");

    Ok(OverlayPage {
        geometry,
        content,
        resources: overlay_resources(style),
    })
}

fn push_text(content: &mut Vec<u8>, state: &str, fill: &str, font_size: &str, x: f64, y: f64, literal: &[u8]) {
    let head = format!(
        "/{} gs {} BT /{} {} Tf 1 0 0 1 {} {} Tm (",
        state, fill, FONT_NAME, font_size, num(x), num(y)
    );
    content.extend_from_slice(head.as_bytes());
    content.extend_from_slice(literal);
    content.extend_from_slice(b") Tj ET\n");
}

fn overlay_resources(style: &WatermarkStyle) -> Dictionary {
    let mut fonts = Dictionary::new();
    fonts.set(FONT_NAME, Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => BASE_FONT,
        "Encoding" => "WinAnsiEncoding",
    }));

    let mut states = Dictionary::new();
    states.set(HALO_STATE, Object::Dictionary(opacity_state(style.halo_opacity)));
    states.set(INK_STATE, Object::Dictionary(opacity_state(style.ink_opacity)));

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources.set("ExtGState", Object::Dictionary(states));
    resources
}

fn opacity_state(opacity: f32) -> Dictionary {
    let opacity = opacity.clamp(0.0, 1.0);
    dictionary! {
        "Type" => "ExtGState",
        "BM" => "Normal",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    }
}

/// Fixed-precision number for content streams
fn num(value: f64) -> String {
    let formatted = format!("{:.3}", value);
    if formatted == "-0.000" {
        "0.000".to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::metadata::page_geometries;

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_spec_is_active() {
        assert!(WatermarkSpec::new("CONFIDENTIAL").is_active());
        assert!(!WatermarkSpec::new("   ").is_active());
        assert!(!WatermarkSpec::new("").is_active());
        let disabled = WatermarkSpec { text: "COPY".to_string(), enabled: false };
        assert!(!disabled.is_active());
    }

    #[test]
    fn test_overlay_geometry_matches_request() {
        let overlay = tile("CONFIDENTIAL", 595.0, 842.0).unwrap();
        assert_eq!(overlay.geometry, PageGeometry::new(595.0, 842.0));

        let doc = overlay.to_document();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(page_geometries(&doc).unwrap(), vec![PageGeometry::new(595.0, 842.0)]);
    }

    #[test]
    fn test_tile_is_deterministic() {
        let a = tile("CONFIDENTIAL", 612.0, 792.0).unwrap();
        let b = tile("CONFIDENTIAL", 612.0, 792.0).unwrap();
        assert_eq!(a.geometry, b.geometry);
        assert_eq!(a.content, b.content);
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_every_tile_drawn_twice() {
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let halo = count(&overlay.content, b"/WmHalo gs 1 g");
        let ink = count(&overlay.content, b"/WmInk gs 0 g");
        assert!(ink > 0);
        assert_eq!(halo, ink);
        assert_eq!(count(&overlay.content, b"(COPY) Tj"), 2 * ink);
    }

    #[test]
    fn test_tile_count_follows_steps() {
        // radius = 500; text width of "COPY" at 40pt = 113.36; step_x = 233.36
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let columns = (1000.0_f64 / 233.36).floor() as usize + 1;
        let rows = (1000.0_f64 / 160.0).floor() as usize + 1;
        assert_eq!(count(&overlay.content, b"/WmInk gs"), columns * rows);
    }

    #[test]
    fn test_frame_is_centered_and_rotated() {
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let text = String::from_utf8_lossy(&overlay.content);
        assert!(text.starts_with("q\n1 0 0 1 150.000 200.000 cm\n"));
        let cos = 35f64.to_radians().cos();
        let sin = 35f64.to_radians().sin();
        let rotation = format!("{:.3} {:.3} {:.3} {:.3} 0 0 cm", cos, sin, -sin, cos);
        assert!(text.contains(&rotation));
        assert!(text.trim_end().ends_with('Q'));
    }

    #[test]
    fn test_halo_is_offset_from_ink() {
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let text = String::from_utf8_lossy(&overlay.content);
        // First tile: x = -500 - 113.36/2 = -556.68, y = -500
        assert!(text.contains("/WmHalo gs 1 g BT /WmF1 40.000 Tf 1 0 0 1 -555.680 -501.000 Tm (COPY) Tj ET"));
        assert!(text.contains("/WmInk gs 0 g BT /WmF1 40.000 Tf 1 0 0 1 -556.680 -500.000 Tm (COPY) Tj ET"));
    }

    #[test]
    fn test_resources_declare_font_and_opacity() {
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let fonts = overlay.resources.get(b"Font").unwrap().as_dict().unwrap();
        let font = fonts.get(b"WmF1").unwrap().as_dict().unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica-Bold");

        let states = overlay.resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        let halo = states.get(b"WmHalo").unwrap().as_dict().unwrap();
        let ink = states.get(b"WmInk").unwrap().as_dict().unwrap();
        assert_eq!(halo.get(b"ca").unwrap().as_float().unwrap(), 0.25);
        assert_eq!(ink.get(b"ca").unwrap().as_float().unwrap(), 0.30);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let overlay = tile("COPY (1)", 300.0, 400.0).unwrap();
        assert!(count(&overlay.content, b"(COPY \\(1\\)) Tj") > 0);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(matches!(tile("COPY", 0.0, 100.0), Err(Error::InvalidGeometry { .. })));
        assert!(matches!(tile("COPY", f32::NAN, 100.0), Err(Error::InvalidGeometry { .. })));
    }

    #[test]
    fn test_form_xobject_translated_to_origin() {
        let overlay = tile("COPY", 300.0, 400.0).unwrap();
        let form = overlay.to_form_xobject((10.0, 20.0));
        let matrix = form.dict.get(b"Matrix").unwrap().as_array().unwrap();
        assert_eq!(matrix[4].as_float().unwrap(), 10.0);
        assert_eq!(matrix[5].as_float().unwrap(), 20.0);
        assert_eq!(form.content, overlay.content);
    }
}
