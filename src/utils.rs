//! Utility functions for numeral formatting, text sanitization, and file
//! system operations.
//!
//! This module provides helper functions used throughout the pipeline:
//! - Roman numeral rendering for MODS issue labels
//! - Control-character sanitization for embedded page text
//! - Deterministic per-page file naming shared by ALTO, METS, and the
//!   package writer
//! - File system validation for output directories

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Non-printable control bytes that must never reach an XML text node.
/// Tab, newline, and carriage return are kept.
static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());

/// Convert a number to uppercase Roman numerals using standard subtractive
/// notation.
///
/// Used for the volume number in the MODS issue label, e.g. volume 147
/// renders as `"CXLVII"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(roman_numeral(147), "CXLVII");
/// assert_eq!(roman_numeral(4), "IV");
/// ```
pub fn roman_numeral(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

/// Strip non-printable control characters from captured page text.
///
/// Captured plain text occasionally carries control bytes from the renderer.
/// Library ingestion tooling rejects them in XML text nodes, so they are
/// removed rather than aborting generation. Tab, newline, and carriage
/// return survive.
pub fn sanitize_text(text: &str) -> String {
    CONTROL_CHARS.replace_all(text, "").into_owned()
}

/// Deterministic ALTO filename for a physical page, e.g. `alto_0001.xml`.
pub fn alto_filename(page_number: usize) -> String {
    format!("alto_{:04}.xml", page_number)
}

/// Deterministic page image filename, e.g. `page_0001.png`.
pub fn image_filename(page_number: usize) -> String {
    format!("page_{:04}.png", page_number)
}

/// METS file ID for a page's ALTO file, e.g. `ALTO_0001`.
pub fn alto_file_id(page_number: usize) -> String {
    format!("ALTO_{:04}", page_number)
}

/// METS file ID for a page's image file, e.g. `IMG_0001`.
pub fn image_file_id(page_number: usize) -> String {
    format!("IMG_{:04}", page_number)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
