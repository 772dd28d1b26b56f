//! Data models for captured content and assembled issues.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`DescriptorRecord`]: A raw manifest row naming one content unit to capture
//! - [`ContentDescriptor`]: A validated descriptor handed to the capture adapter
//! - [`CapturedUnit`]: The capture adapter's output for one unit
//! - [`ContentUnit`]: A captured unit with its assigned page range
//! - [`Issue`]: One assembled archival issue, consumed once by the generators
//!
//! Descriptors are validated at the ingestion boundary (URL parse, tagged
//! [`ContentKind`]) so the downstream stages pattern-match exhaustively
//! instead of probing for field presence.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use url::Url;

/// What kind of content a unit is. Newsletters sort ahead of articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Newsletter,
}

/// One row of the capture manifest, as listed by the external source
/// collaborators (website search API, Mailchimp campaign listing).
///
/// `pdf` points at a pre-rendered capture for the file-replay adapter;
/// a browser-driven adapter ignores it and renders `url` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub url: String,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub category: Option<String>,
    pub text: Option<String>,
    pub pdf: Option<PathBuf>,
    /// Publication timestamp, used to filter newsletters to the issue window.
    pub published: Option<NaiveDateTime>,
}

/// A validated content descriptor, ready for the capture adapter.
#[derive(Debug, Clone)]
pub struct ContentDescriptor {
    pub url: String,
    pub kind: ContentKind,
    pub title: Option<String>,
    pub category: Option<String>,
    pub published: Option<NaiveDateTime>,
}

impl ContentDescriptor {
    /// Validate a manifest row. Rejects rows whose URL does not parse.
    pub fn from_record(record: &DescriptorRecord) -> Result<Self, Box<dyn Error>> {
        let url = Url::parse(&record.url)?;
        Ok(Self {
            url: url.to_string(),
            kind: record.kind,
            title: record.title.clone(),
            category: record.category.clone(),
            published: record.published,
        })
    }
}

/// A half-open `[start, end)` time window selecting newsletters for an issue.
#[derive(Debug, Clone, Copy)]
pub struct NewsletterWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl NewsletterWindow {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at < self.end
    }
}

/// The capture adapter's output for a single content unit: the rendered PDF
/// plus the plain text the renderer extracted from the page.
#[derive(Debug, Clone)]
pub struct CapturedUnit {
    pub url: String,
    pub title: String,
    pub plain_text: String,
    pub pdf: Vec<u8>,
    pub page_count: usize,
}

/// A contiguous, 1-based, inclusive range of physical pages.
///
/// Assigned by the assembler once a unit's page count is known; immutable
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Build the range covering `page_count` pages starting at `start`.
    pub fn from_start(start: usize, page_count: usize) -> Self {
        Self {
            start,
            end: start + page_count - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// The MODS extent label: `"p. N"` for a single page, `"p. N - M"`
    /// otherwise.
    pub fn extent_label(&self) -> String {
        if self.start == self.end {
            format!("p. {}", self.start)
        } else {
            format!("p. {} - {}", self.start, self.end)
        }
    }
}

/// A successfully captured content unit with its place in the issue.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub source_url: String,
    pub kind: ContentKind,
    pub title: String,
    pub plain_text: String,
    pub pdf: Vec<u8>,
    pub page_range: PageRange,
}

/// One assembled archival issue.
///
/// Built incrementally by the assembler as captures succeed, closed once all
/// capture attempts are exhausted, and consumed exactly once by the
/// downstream generators. No persistent store exists for issues; the
/// pipeline is stateless between runs.
#[derive(Debug, Clone)]
pub struct Issue {
    /// Timestamped identifier fixed at run start; all package filenames
    /// derive from it.
    pub name: String,
    pub date: NaiveDate,
    pub volume_number: u32,
    pub issue_number: u32,
    pub units: Vec<ContentUnit>,
    pub total_pages: usize,
}
