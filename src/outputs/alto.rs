//! Per-page ALTO text-layer generation.
//!
//! Each physical page of the issue gets one ALTO v4 XML document. The text
//! for a page comes from the content unit whose page range *starts* there;
//! every other page in a unit's range (and any page without text) is a
//! blank page, emitted with no `TextBlock` element at all — library
//! ingestion tooling treats the presence of a `TextBlock` as a content
//! marker, so an empty-string block would be wrong.
//!
//! Generation is per-page independent, so pages fan out across blocking
//! workers; outputs are collected keyed by page number and only sequenced
//! once all complete, keeping completion order out of the file list.

use crate::error::ArchiveError;
use crate::models::Issue;
use crate::utils::{alto_filename, sanitize_text};
use crate::xml::{Namespace, XmlElement};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// ALTO v4 namespace binding.
pub const ALTO_NS: Namespace = Namespace {
    prefix: "alto",
    uri: "http://www.loc.gov/standards/alto/ns-v4#",
};

/// Physical page size: US Letter, 8.5in x 11in.
const PAGE_WIDTH_IN: f64 = 8.5;
const PAGE_HEIGHT_IN: f64 = 11.0;

/// How many pages render concurrently.
const PARALLEL_PAGES: usize = 8;

/// One generated ALTO document.
#[derive(Debug, Clone)]
pub struct AltoPage {
    pub page_number: usize,
    pub filename: String,
    pub xml: String,
}

/// Page pixel dimensions at the given DPI.
pub fn page_dimensions(dpi: u32) -> (u32, u32) {
    (
        (PAGE_WIDTH_IN * f64::from(dpi)).round() as u32,
        (PAGE_HEIGHT_IN * f64::from(dpi)).round() as u32,
    )
}

/// Map each physical page number to the sanitized text of the content unit
/// whose range starts there. Pages without an entry are blank.
///
/// Start pages are unique by construction (the assembler rejects zero-page
/// captures), so no two units can claim the same page.
pub fn resolve_page_texts(issue: &Issue) -> BTreeMap<usize, String> {
    let mut texts = BTreeMap::new();
    for unit in &issue.units {
        let text = sanitize_text(&unit.plain_text);
        if text.trim().is_empty() {
            continue;
        }
        if texts.insert(unit.page_range.start, text).is_some() {
            warn!(
                start = unit.page_range.start,
                url = %unit.source_url,
                "Two units share a start page; keeping the later one"
            );
        }
    }
    texts
}

/// Build the ALTO document for a single page.
pub fn build_alto_document(page_number: usize, text: Option<&str>, dpi: u32) -> String {
    let (width, height) = page_dimensions(dpi);
    let page_id = format!("PAGE_{:04}", page_number);

    let mut page = XmlElement::new("alto:Page")
        .attr("ID", &page_id)
        .attr("PHYSICAL_IMG_NR", page_number.to_string())
        .attr("WIDTH", width.to_string())
        .attr("HEIGHT", height.to_string());

    if let Some(text) = text {
        page = page.child(
            XmlElement::new("alto:TextBlock")
                .attr("ID", format!("{page_id}_BLOCK_1"))
                .child(XmlElement::new("alto:String").text(text)),
        );
    }

    XmlElement::new("alto:alto")
        .namespaces(&[ALTO_NS])
        .child(
            XmlElement::new("alto:Description")
                .child(XmlElement::new("alto:MeasurementUnit").text("pixel")),
        )
        .child(XmlElement::new("alto:Layout").child(page))
        .to_document()
}

/// Generate one ALTO document per physical page, in page order.
#[instrument(level = "info", skip_all, fields(issue = %issue.name, pages = issue.total_pages))]
pub async fn generate_all(issue: &Issue, dpi: u32) -> Result<Vec<AltoPage>, ArchiveError> {
    let texts = resolve_page_texts(issue);
    let inputs: Vec<(usize, Option<String>)> = (1..=issue.total_pages)
        .map(|page_number| (page_number, texts.get(&page_number).cloned()))
        .collect();

    let mut workers = stream::iter(inputs.into_iter().map(|(page_number, text)| {
        tokio::task::spawn_blocking(move || AltoPage {
            page_number,
            filename: alto_filename(page_number),
            xml: build_alto_document(page_number, text.as_deref(), dpi),
        })
    }))
    .buffer_unordered(PARALLEL_PAGES);

    // Collect keyed by page number; completion order must not affect the
    // final ordering.
    let mut generated: BTreeMap<usize, AltoPage> = BTreeMap::new();
    while let Some(joined) = workers.next().await {
        let page = joined
            .map_err(|e| ArchiveError::AltoGeneration(format!("page worker failed: {e}")))?;
        generated.insert(page.page_number, page);
    }

    info!(count = generated.len(), "Generated ALTO documents");
    Ok(generated.into_values().collect())
}
