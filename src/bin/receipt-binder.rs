//! Receipt Binder CLI tool
//!
//! A command-line tool for compiling receipts into one watermarked PDF.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use receipt_binder::pdf::{count_pages, page_geometries, tile_with_style, NormalizeOptions};
use receipt_binder::{compile_paths, CompileOptions, CompileOutcome, PageGeometry, WatermarkSpec, WatermarkStyle};

/// Exit status when no input produced a page
const EXIT_NOTHING_TO_COMPILE: i32 = 2;

/// Receipt Binder - Compile receipts into one watermarked PDF
#[derive(Parser)]
#[command(name = "receipt-binder")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Compile every receipt of a category with a watermark
    receipt-binder compile --category Besoins --watermark \"CONFIDENTIAL\" \"factures/*\"

    # Compile explicit files in the given order
    receipt-binder compile -o bundle.pdf ticket.jpg facture.pdf

    # Preview the watermark tiling on an A4 page
    receipt-binder watermark-preview --width 595 --height 842 -o preview.pdf \"COPIE\"")]
struct Cli {
    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile receipts (PDF, PNG, JPEG) into one PDF
    Compile {
        /// Receipt files (in order). Supports glob patterns like "factures/*"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path ("-" for stdout)
        #[arg(short, long, required_unless_present = "category")]
        output: Option<PathBuf>,

        /// Category name; the output defaults to "{category}_justificatifs.pdf"
        #[arg(long)]
        category: Option<String>,

        /// Watermark text tiled across every page
        #[arg(short, long)]
        watermark: Option<String>,

        /// Resolution used to size image receipts
        #[arg(long, default_value_t = 72.0)]
        dpi: f32,

        /// Open the output file after creation (not with "-o -")
        #[arg(long)]
        open: bool,
    },

    /// Write the watermark overlay alone as a one-page PDF
    WatermarkPreview {
        /// Watermark text
        text: String,

        /// Page width in points
        #[arg(long, default_value_t = 595.0)]
        width: f32,

        /// Page height in points
        #[arg(long, default_value_t = 842.0)]
        height: f32,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show page count and page sizes of a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile { inputs, output, category, watermark, dpi, open } => {
            cmd_compile(inputs, output, category, watermark, dpi, open)
        }
        Commands::WatermarkPreview { text, width, height, output } => {
            cmd_watermark_preview(&text, width, height, &output)
        }
        Commands::Info { input } => cmd_info(&input),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose { "receipt_binder=debug" } else { "receipt_binder=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .with(filter)
        .init();
}

/// Expand glob patterns in input paths
///
/// Matches of one pattern are sorted; literal paths keep their position.
/// Missing literal paths are passed through so they are reported as skipped.
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = Vec::new();
            for entry in glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
                match entry {
                    Ok(path) if path.is_file() => matched.push(path),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(pattern = %pattern, error = %e, "glob error"),
                }
            }
            if matched.is_empty() {
                tracing::warn!(pattern = %pattern, "no files matched pattern");
            }
            matched.sort();
            paths.extend(matched);
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Suggested output name for a category's receipts
fn category_output_name(category: &str) -> PathBuf {
    let safe: String = category
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    PathBuf::from(format!("{}_justificatifs.pdf", safe.trim()))
}

/// Command handing `path` to the desktop's default PDF viewer
fn viewer_command(path: &Path) -> process::Command {
    let mut command = if cfg!(target_os = "windows") {
        let mut start = process::Command::new("cmd");
        start.args(["/C", "start", ""]);
        start
    } else if cfg!(target_os = "macos") {
        process::Command::new("open")
    } else {
        process::Command::new("xdg-open")
    };
    command.arg(path);
    command
}

fn open_file(path: &Path) -> Result<()> {
    viewer_command(path)
        .spawn()
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}

/// Compile receipts into one PDF
fn cmd_compile(
    inputs: Vec<String>,
    output: Option<PathBuf>,
    category: Option<String>,
    watermark: Option<String>,
    dpi: f32,
    open: bool,
) -> Result<i32> {
    let output = match (output, category.as_deref()) {
        (Some(output), _) => output,
        (None, Some(category)) => category_output_name(category),
        (None, None) => bail!("either --output or --category is required"),
    };

    if open && output.as_os_str() == "-" {
        bail!("--open needs a file output, not stdout");
    }

    let inputs = expand_globs(inputs)?;

    eprintln!("Compiling {} receipt file(s)...", inputs.len());

    let options = CompileOptions {
        watermark: watermark.map(WatermarkSpec::new),
        normalize: NormalizeOptions { raster_dpi: dpi },
        style: WatermarkStyle::default(),
    };

    let outcome = compile_paths(inputs, &options).context("Failed to compile receipts")?;

    for skipped in outcome.skipped() {
        eprintln!("Skipped: {}", skipped);
    }

    let (document, report) = match outcome {
        CompileOutcome::Compiled { document, report } => (document, report),
        CompileOutcome::NothingToCompile { .. } => {
            eprintln!("Nothing to compile: no readable receipt.");
            return Ok(EXIT_NOTHING_TO_COMPILE);
        }
    };

    for fallback in &report.fallbacks {
        eprintln!("Page {} kept without watermark: {}", fallback.page_number, fallback.reason);
    }

    if output.as_os_str() == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.flush()?;
    } else {
        document
            .save(&output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!("Compiled {} page(s) to: {}", document.page_count(), output.display());

        if open {
            open_file(&output)?;
        }
    }

    Ok(0)
}

/// Write the overlay page for a given size
fn cmd_watermark_preview(text: &str, width: f32, height: f32, output: &Path) -> Result<i32> {
    if text.trim().is_empty() {
        bail!("watermark text is blank");
    }

    let overlay = tile_with_style(text, PageGeometry::new(width, height), &WatermarkStyle::default())?;
    let bytes = overlay.to_bytes()?;
    std::fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!("Overlay ({} x {} pt) written to: {}", width, height, output.display());
    Ok(0)
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<i32> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let page_count = count_pages(&bytes)?;
    let doc = lopdf::Document::load_mem(&bytes)?;
    let geometries = page_geometries(&doc)?;

    println!("File: {}", input.display());
    println!("Pages: {}", page_count);
    for (i, geometry) in geometries.iter().enumerate() {
        println!("  {:>4}: {:.2} x {:.2} pt", i + 1, geometry.width, geometry.height);
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_output_name() {
        assert_eq!(category_output_name("Besoins"), PathBuf::from("Besoins_justificatifs.pdf"));
        assert_eq!(category_output_name("Loisirs/Sport"), PathBuf::from("Loisirs_Sport_justificatifs.pdf"));
    }

    #[test]
    fn test_open_rejected_with_stdout_output() {
        let result = cmd_compile(
            vec!["never-read.pdf".to_string()],
            Some(PathBuf::from("-")),
            None,
            None,
            72.0,
            true,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("--open"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_viewer_command_targets_path() {
        let command = viewer_command(Path::new("bundle.pdf"));
        assert_eq!(command.get_program(), std::ffi::OsStr::new("xdg-open"));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![std::ffi::OsStr::new("bundle.pdf")]);
    }

    #[test]
    fn test_literal_paths_keep_order() {
        let paths = expand_globs(vec!["b.pdf".to_string(), "a.jpg".to_string()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("b.pdf"), PathBuf::from("a.jpg")]);
    }
}
