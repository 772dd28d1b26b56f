//! Issue assembly: ordering, capture, and page-range assignment.
//!
//! The assembler takes the validated content descriptors for one issue,
//! orders them (newsletters for the window first, then articles by the
//! fixed category priority), captures each in order through the adapter,
//! and assigns every successful capture a contiguous 1-based page range.
//!
//! Per-unit capture failures are soft: they are logged with URL context and
//! skipped, and the running page counter simply never advances for them, so
//! the contiguity invariant holds regardless of which units failed. A run
//! where nothing captured successfully is a [`AssemblyOutcome::NoContent`]
//! result, not an error, so callers can skip archiving an empty period
//! without treating it as a failure.

use crate::capture::CaptureAdapter;
use crate::models::{
    ContentDescriptor, ContentKind, ContentUnit, Issue, NewsletterWindow, PageRange,
};
use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use tracing::{debug, error, info, instrument, warn};

/// Fixed category priority for article ordering. Categories not in the list
/// sort with `other`.
static CATEGORY_PRIORITY: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "letter-from-the-editor",
        "news",
        "Analysis",
        "Opinion",
        "Sports",
        "Features",
        "data",
        "Prospect",
        "visual essay",
        "other",
        "Humor",
    ]
});

fn category_rank(category: Option<&str>) -> usize {
    static FALLBACK: Lazy<usize> = Lazy::new(|| {
        CATEGORY_PRIORITY
            .iter()
            .position(|c| *c == "other")
            .unwrap()
    });
    category
        .and_then(|c| CATEGORY_PRIORITY.iter().position(|p| *p == c))
        .unwrap_or(*FALLBACK)
}

/// Issue identity fixed at run start.
#[derive(Debug, Clone)]
pub struct IssueMeta {
    pub name: String,
    pub date: NaiveDate,
    pub volume_number: u32,
    pub issue_number: u32,
}

/// Result of an assembly run.
#[derive(Debug)]
pub enum AssemblyOutcome {
    /// No unit captured successfully; nothing to archive for this period.
    NoContent,
    /// At least one unit captured; the issue is ready for the generators.
    Assembled(Issue),
}

/// Order descriptors for capture: newsletters inside the window first
/// (manifest order preserved), then articles stably sorted by category
/// priority.
///
/// Newsletters without a publication timestamp are kept; the external
/// listing normally pre-filters them, and dropping them here would lose
/// content over missing metadata.
pub fn order_descriptors(
    descriptors: Vec<ContentDescriptor>,
    window: Option<&NewsletterWindow>,
) -> Vec<ContentDescriptor> {
    let (newsletters, articles): (Vec<_>, Vec<_>) = descriptors
        .into_iter()
        .partition(|d| d.kind == ContentKind::Newsletter);

    let mut ordered: Vec<ContentDescriptor> = newsletters
        .into_iter()
        .filter(|d| match (window, d.published) {
            (Some(w), Some(at)) => {
                let inside = w.contains(at);
                if !inside {
                    debug!(url = %d.url, %at, "Newsletter outside issue window; dropped");
                }
                inside
            }
            _ => true,
        })
        .collect();

    ordered.extend(
        articles
            .into_iter()
            .sorted_by_key(|d| category_rank(d.category.as_deref())),
    );
    ordered
}

/// Capture every descriptor in order and assemble the issue.
///
/// The page counter is an explicit accumulator threaded through the loop:
/// it starts at 1 and advances by each successful capture's page count, so
/// assigned ranges are contiguous and non-overlapping by construction. A
/// capture reporting zero pages is treated as a capture bug and skipped;
/// this is what keeps start pages unique across units.
#[instrument(level = "info", skip_all, fields(issue = %meta.name, descriptors = descriptors.len()))]
pub async fn assemble_issue<A: CaptureAdapter>(
    adapter: &mut A,
    descriptors: Vec<ContentDescriptor>,
    window: Option<&NewsletterWindow>,
    meta: IssueMeta,
) -> AssemblyOutcome {
    let ordered = order_descriptors(descriptors, window);
    let attempted = ordered.len();

    let mut units: Vec<ContentUnit> = Vec::new();
    let mut next_page = 1usize;

    for descriptor in &ordered {
        match adapter.capture(descriptor).await {
            Ok(captured) => {
                if captured.page_count == 0 {
                    warn!(url = %descriptor.url, "Capture reported zero pages; skipping unit");
                    continue;
                }
                let page_range = PageRange::from_start(next_page, captured.page_count);
                next_page = page_range.end + 1;
                info!(
                    url = %descriptor.url,
                    start = page_range.start,
                    end = page_range.end,
                    "Captured content unit"
                );
                units.push(ContentUnit {
                    source_url: captured.url,
                    kind: descriptor.kind,
                    title: captured.title,
                    plain_text: captured.plain_text,
                    pdf: captured.pdf,
                    page_range,
                });
            }
            Err(e) => {
                error!(url = %descriptor.url, error = %e, "Capture failed; skipping unit");
            }
        }
    }

    if units.is_empty() {
        info!(attempted, "No content captured; nothing to archive");
        return AssemblyOutcome::NoContent;
    }

    let total_pages = next_page - 1;
    info!(
        captured = units.len(),
        failed = attempted - units.len(),
        total_pages,
        "Issue assembled"
    );
    AssemblyOutcome::Assembled(Issue {
        name: meta.name,
        date: meta.date,
        volume_number: meta.volume_number,
        issue_number: meta.issue_number,
        units,
        total_pages,
    })
}
