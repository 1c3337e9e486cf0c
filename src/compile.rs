//! Receipt compilation: normalize, merge, then watermark

use std::path::{Path, PathBuf};
use lopdf::Document;
use tracing::{debug, info};
use crate::error::Result;
use crate::pdf::{
    merge_documents, normalize, save_to_bytes, stamp_watermark, NormalizeOptions, Normalized,
    PageFallback, SourceError, SourceFile, WatermarkSpec, WatermarkStyle,
};

/// Options for a compile run
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Watermark to stamp; `None` or blank text leaves pages untouched
    pub watermark: Option<WatermarkSpec>,
    pub normalize: NormalizeOptions,
    pub style: WatermarkStyle,
}

impl CompileOptions {
    /// Default options with the given watermark text
    pub fn with_watermark(text: impl Into<String>) -> Self {
        Self {
            watermark: Some(WatermarkSpec::new(text)),
            ..Default::default()
        }
    }

    fn active_watermark(&self) -> Option<&str> {
        self.watermark
            .as_ref()
            .filter(|w| w.is_active())
            .map(|w| w.text.as_str())
    }
}

/// A finished PDF
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    bytes: Vec<u8>,
    page_count: usize,
}

impl CompiledDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Write the PDF to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Details of a compile run
#[derive(Debug, Default)]
pub struct CompileReport {
    pub page_count: usize,
    /// Sources that contributed no pages
    pub skipped: Vec<SourceError>,
    pub watermarked_pages: usize,
    /// Pages kept without a watermark
    pub fallbacks: Vec<PageFallback>,
    pub overlays_generated: usize,
}

/// Result of [`compile`]
#[derive(Debug)]
pub enum CompileOutcome {
    Compiled {
        document: CompiledDocument,
        report: CompileReport,
    },
    /// No source yielded a page; no PDF was produced
    NothingToCompile { skipped: Vec<SourceError> },
}

impl CompileOutcome {
    pub fn document(&self) -> Option<&CompiledDocument> {
        match self {
            CompileOutcome::Compiled { document, .. } => Some(document),
            CompileOutcome::NothingToCompile { .. } => None,
        }
    }

    pub fn into_document(self) -> Option<CompiledDocument> {
        match self {
            CompileOutcome::Compiled { document, .. } => Some(document),
            CompileOutcome::NothingToCompile { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CompileOutcome::NothingToCompile { .. })
    }

    pub fn skipped(&self) -> &[SourceError] {
        match self {
            CompileOutcome::Compiled { report, .. } => &report.skipped,
            CompileOutcome::NothingToCompile { skipped } => skipped,
        }
    }
}

/// Compile receipts into one PDF.
///
/// Unreadable sources are skipped and pages that cannot be watermarked are
/// kept as they are. Only a failure to serialize the result is an error.
///
/// # Example
///
/// ```no_run
/// use receipt_binder::{compile, CompileOptions, SourceFile};
///
/// let sources = vec![
///     SourceFile::from_path("factures/20240105_ticket.jpg").unwrap(),
///     SourceFile::from_path("factures/20240112_facture.pdf").unwrap(),
/// ];
///
/// let outcome = compile(&sources, &CompileOptions::with_watermark("CONFIDENTIAL"))
///     .expect("Failed to compile receipts");
///
/// if let Some(document) = outcome.document() {
///     document.save("Besoins_justificatifs.pdf".as_ref()).unwrap();
/// }
/// ```
pub fn compile(sources: &[SourceFile], options: &CompileOptions) -> Result<CompileOutcome> {
    let normalized = normalize(sources, &options.normalize);
    finish(normalized, options)
}

/// Compile receipts given as raw paths, classifying them by extension
pub fn compile_paths<I, P>(paths: I, options: &CompileOptions) -> Result<CompileOutcome>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let normalized = crate::pdf::normalize_paths(paths, &options.normalize);
    finish(normalized, options)
}

fn finish(normalized: Normalized, options: &CompileOptions) -> Result<CompileOutcome> {
    if normalized.is_empty() {
        info!(skipped = normalized.skipped.len(), "nothing to compile");
        return Ok(CompileOutcome::NothingToCompile { skipped: normalized.skipped });
    }

    let page_count = normalized.page_count();
    let Normalized { sources, skipped } = normalized;
    let documents: Vec<Document> = sources.into_iter().map(|s| s.document).collect();

    let mut merged = merge_documents(documents)?;
    let merged_bytes = save_to_bytes(&mut merged)?;

    let mut report = CompileReport {
        page_count,
        skipped,
        ..Default::default()
    };

    let Some(text) = options.active_watermark() else {
        debug!(pages = page_count, bytes = merged_bytes.len(), "compiled without watermark");
        return Ok(CompileOutcome::Compiled {
            document: CompiledDocument { bytes: merged_bytes, page_count },
            report,
        });
    };

    // The merged buffer is the canonical page source for stamping
    let mut doc = Document::load_mem(&merged_bytes)?;
    let stamp = stamp_watermark(&mut doc, text, &options.style);
    let bytes = save_to_bytes(&mut doc)?;

    report.watermarked_pages = stamp.watermarked_pages;
    report.fallbacks = stamp.fallbacks;
    report.overlays_generated = stamp.overlays_generated;

    info!(
        pages = page_count,
        watermarked = report.watermarked_pages,
        fallbacks = report.fallbacks.len(),
        overlays = report.overlays_generated,
        bytes = bytes.len(),
        "compiled receipts"
    );

    Ok(CompileOutcome::Compiled {
        document: CompiledDocument { bytes, page_count },
        report,
    })
}
