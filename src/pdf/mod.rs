//! PDF manipulation module

pub mod source;
pub mod normalize;
pub mod merge;
pub mod metadata;
pub mod font;
pub mod watermark;
pub mod compose;

// Re-export commonly used items
pub use source::{SourceError, SourceFile, SourceKind};
pub use normalize::{normalize, normalize_paths, NormalizeOptions, Normalized};
pub use merge::{merge_documents, save_to_bytes};
pub use metadata::{count_pages, page_box, page_geometries, PageBox};
pub use watermark::{tile, tile_with_style, OverlayPage, WatermarkSpec, WatermarkStyle};
pub use compose::{stamp_watermark, PageFallback, StampReport};
