//! Receipt Binder Library
//!
//! Compiles the receipts attached to a budget category into a single PDF.
//! This library provides functionality to:
//! - Normalize PDF and PNG/JPEG receipts into PDF pages, skipping unreadable files
//! - Merge the pages into one document in input order
//! - Stamp a diagonal, tiled, two-tone text watermark on every page
//! - Inspect page counts and page geometry
//!
//! # Example
//!
//! ```no_run
//! use receipt_binder::{compile_paths, CompileOptions, CompileOutcome};
//!
//! let outcome = compile_paths(
//!     ["factures/ticket.jpg", "factures/facture.pdf"],
//!     &CompileOptions::with_watermark("CONFIDENTIAL"),
//! )
//! .expect("Failed to compile receipts");
//!
//! match outcome {
//!     CompileOutcome::Compiled { document, .. } => {
//!         std::fs::write("justificatifs.pdf", document.as_bytes()).unwrap();
//!     }
//!     CompileOutcome::NothingToCompile { .. } => println!("Nothing to compile"),
//! }
//! ```

pub mod error;
pub mod pdf;
pub mod layout;
pub mod compile;

// Re-export commonly used items
pub use error::{Error, Result};
pub use layout::PageGeometry;
pub use pdf::{SourceFile, SourceKind, WatermarkSpec, WatermarkStyle};
pub use compile::{compile, compile_paths, CompileOptions, CompileOutcome, CompileReport, CompiledDocument};
