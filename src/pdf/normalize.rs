//! Turn heterogeneous receipt files into PDF pages
//!
//! Every source is loaded independently. A source that cannot be read
//! (missing, corrupt, encrypted, unsupported) is recorded as a
//! [`SourceError`] and the batch moves on to the next one.

use std::path::{Path, PathBuf};
use image::{DynamicImage, ImageReader};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, warn};
use crate::error::{Error, Result};
use crate::layout::{PageGeometry, POINTS_PER_INCH};
use super::source::{SourceError, SourceFile, SourceKind};

/// Options for normalizing sources into pages
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Resolution used to size raster pages; at 72 dpi one pixel is one point
    pub raster_dpi: f32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { raster_dpi: POINTS_PER_INCH }
    }
}

/// A source that was read successfully
#[derive(Debug)]
pub struct NormalizedSource {
    pub path: PathBuf,
    pub document: Document,
    pub page_count: usize,
}

/// Outcome of normalizing a batch of sources
#[derive(Debug, Default)]
pub struct Normalized {
    /// Readable sources, in input order
    pub sources: Vec<NormalizedSource>,
    /// Skipped sources, in input order
    pub skipped: Vec<SourceError>,
}

impl Normalized {
    /// Total pages over all readable sources
    pub fn page_count(&self) -> usize {
        self.sources.iter().map(|s| s.page_count).sum()
    }

    /// True when no source produced a page
    pub fn is_empty(&self) -> bool {
        self.page_count() == 0
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.sources.into_iter().map(|s| s.document).collect()
    }

    fn push(&mut self, path: &Path, outcome: Result<Document>) {
        match outcome {
            Ok(document) => {
                let page_count = document.get_pages().len();
                debug!(path = %path.display(), pages = page_count, "normalized source");
                self.sources.push(NormalizedSource {
                    path: path.to_path_buf(),
                    document,
                    page_count,
                });
            }
            Err(reason) => self.skip(SourceError { path: path.to_path_buf(), reason }),
        }
    }

    fn skip(&mut self, error: SourceError) {
        warn!(path = %error.path.display(), error = %error.reason, "skipping unreadable source");
        self.skipped.push(error);
    }
}

/// Normalize sources into PDF documents, preserving input order
pub fn normalize(sources: &[SourceFile], options: &NormalizeOptions) -> Normalized {
    let mut normalized = Normalized::default();
    for source in sources {
        normalized.push(&source.path, load_source(source, options));
    }
    normalized
}

/// Classify raw paths by extension and normalize them.
///
/// Paths with an unsupported extension are skipped like unreadable files.
pub fn normalize_paths<I, P>(paths: I, options: &NormalizeOptions) -> Normalized
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut normalized = Normalized::default();
    for classified in SourceFile::classify_all(paths) {
        match classified {
            Ok(source) => normalized.push(&source.path, load_source(&source, options)),
            Err(error) => normalized.skip(error),
        }
    }
    normalized
}

/// Load one source as a PDF document
pub fn load_source(source: &SourceFile, options: &NormalizeOptions) -> Result<Document> {
    if !source.path.exists() {
        return Err(Error::FileNotFound(source.path.clone()));
    }

    match source.kind {
        SourceKind::Pdf => load_pdf(&source.path),
        SourceKind::Raster => load_raster(&source.path, options.raster_dpi),
    }
}

fn load_pdf(path: &Path) -> Result<Document> {
    let doc = Document::load(path)?;

    if doc.is_encrypted() {
        return Err(Error::Encrypted(path.to_path_buf()));
    }
    if doc.get_pages().is_empty() {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(doc)
}

fn load_raster(path: &Path, dpi: f32) -> Result<Document> {
    // Sniff the real format; uploads are sometimes misnamed
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    image_to_document(&image, dpi)
}

/// Wrap a decoded image into a single-page PDF.
///
/// The image is flattened to 8-bit RGB (alpha and palettes are dropped) and
/// drawn to fill a page sized from its pixel dimensions at `dpi`.
pub fn image_to_document(image: &DynamicImage, dpi: f32) -> Result<Document> {
    let rgb = image.to_rgb8();
    let (width_px, height_px) = rgb.dimensions();
    if width_px == 0 || height_px == 0 {
        return Err(Error::General("Image has no pixels".to_string()));
    }

    let dpi = if dpi.is_finite() && dpi > 0.0 { dpi } else { POINTS_PER_INCH };
    let geometry = PageGeometry::from_pixels(width_px, height_px, dpi);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width_px as i64,
            "Height" => height_px as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));

    let content = format!(
        "q {:.4} 0 0 {:.4} 0 0 cm /Im0 Do Q",
        geometry.width, geometry.height
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(geometry.width),
            Object::Real(geometry.height),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
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

    Ok(doc)
}
