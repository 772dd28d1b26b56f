//! # Prince Archiver
//!
//! The issue assembly pipeline for The Daily Princetonian's web archive.
//! Takes a manifest of independently captured content units (articles and
//! email newsletters, each pre-rendered to a PDF with extracted plain text)
//! and composes them into one archival issue: a single merged PDF, a
//! page-accurate ALTO text layer (one XML document per physical page), and
//! a METS manifest cross-referencing both.
//!
//! ## Usage
//!
//! ```sh
//! prince-archiver -o ./archive -m ./captures/manifest.json --volume 147 --issue 5
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Ingestion**: Validate manifest rows into typed content descriptors
//! 2. **Assembly**: Capture units in order, assign contiguous page ranges
//! 3. **Merge**: Concatenate capture PDFs into the issue PDF (+ optional
//!    page rasterization)
//! 4. **Output**: Generate per-page ALTO, the METS manifest, and write the
//!    archive package
//!
//! Browser rendering, source listing, object-storage upload, and job
//! tracking are external collaborators; this binary only assembles.

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod assembler;
mod capture;
mod cli;
mod error;
mod models;
mod outputs;
mod pdf;
mod utils;
mod xml;

use assembler::{AssemblyOutcome, IssueMeta, assemble_issue};
use capture::{FileCaptureAdapter, RetryCapture};
use cli::Cli;
use error::ArchiveError;
use models::{ContentDescriptor, DescriptorRecord, Issue, NewsletterWindow};
use outputs::package::ArchiveBundle;
use outputs::{alto, mets};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("prince_archiver starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.output_dir, ?args.manifest, "Parsed CLI arguments");

    // Early check: ensure the output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load and validate the capture manifest ----
    let manifest = tokio::fs::read_to_string(&args.manifest).await?;
    let records: Vec<DescriptorRecord> = serde_json::from_str(&manifest)?;
    info!(count = records.len(), path = %args.manifest, "Loaded capture manifest");

    let mut descriptors: Vec<ContentDescriptor> = Vec::new();
    for record in &records {
        match ContentDescriptor::from_record(record) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => warn!(url = %record.url, error = %e, "Invalid manifest row; skipping"),
        }
    }

    let window = match (args.newsletters_from, args.newsletters_until) {
        (Some(start), Some(end)) => Some(NewsletterWindow { start, end }),
        (None, None) => None,
        _ => {
            warn!("Only one side of the newsletter window was given; ignoring it");
            None
        }
    };

    // ---- Issue identity, fixed at run start ----
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let name = args.issue_name.clone().unwrap_or_else(|| {
        format!(
            "daily_princetonian_{}_{}",
            date.format("%Y-%m-%d"),
            Local::now().format("%H%M%S")
        )
    });
    let meta = IssueMeta {
        name,
        date,
        volume_number: args.volume,
        issue_number: args.issue,
    };
    info!(
        issue = %meta.name,
        volume = meta.volume_number,
        number = meta.issue_number,
        "Issue initialized"
    );

    // ---- Capture and assemble ----
    let adapter = FileCaptureAdapter::new(&records);
    let mut adapter = RetryCapture::new(adapter, 3, Duration::from_millis(500));
    let issue = match assemble_issue(&mut adapter, descriptors, window.as_ref(), meta).await {
        AssemblyOutcome::NoContent => {
            info!("No content captured for this period; nothing to archive");
            return Ok(());
        }
        AssemblyOutcome::Assembled(issue) => issue,
    };

    // ---- Generate and write the package ----
    let bundle = build_package(issue, args.images, args.dpi).await?;

    bundle
        .write_to_dir(std::path::Path::new(&args.output_dir))
        .await?;
    info!(path = %args.output_dir, "Wrote archive package tree");

    if let Some(wire_out) = &args.wire_out {
        let wire = serde_json::to_string(&bundle.to_wire())?;
        tokio::fs::write(wire_out, wire).await?;
        info!(path = %wire_out, "Wrote wire bundle");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Run the post-assembly stages: merge, optional rasterization, ALTO
/// generation, and METS generation.
///
/// These stages operate on the immutable issue snapshot; any failure here
/// aborts the issue.
#[instrument(level = "info", skip_all, fields(issue = %issue.name))]
async fn build_package(
    issue: Issue,
    images_requested: bool,
    dpi: u32,
) -> Result<ArchiveBundle, ArchiveError> {
    let pdf = pdf::merge_pdfs(&issue.units)?;

    let images = if images_requested {
        pdf::rasterize_pages(&pdf, dpi, issue.total_pages).await?
    } else {
        Vec::new()
    };

    let alto_pages = alto::generate_all(&issue, dpi).await?;
    let mets = mets::generate(&issue, &alto_pages, &images, Utc::now())?;

    Ok(ArchiveBundle {
        issue_name: issue.name,
        pdf,
        mets,
        alto: alto_pages,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureAdapter;
    use crate::models::ContentKind;
    use crate::pdf::tests::blank_pdf;
    use chrono::NaiveDate;
    use lopdf::Document;
    use std::path::PathBuf;

    fn record(url: &str, pdf: PathBuf, text: &str, category: &str) -> DescriptorRecord {
        DescriptorRecord {
            url: url.to_string(),
            kind: ContentKind::Article,
            title: Some(format!("Title for {url}")),
            category: Some(category.to_string()),
            text: Some(text.to_string()),
            pdf: Some(pdf),
            published: None,
        }
    }

    fn meta(name: &str) -> IssueMeta {
        IssueMeta {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 3, 12).unwrap(),
            volume_number: 147,
            issue_number: 5,
        }
    }

    async fn assemble_fixture(name: &str, dir: &std::path::Path) -> Issue {
        let a_path = dir.join("a.pdf");
        let b_path = dir.join("b.pdf");
        std::fs::write(&a_path, blank_pdf(2)).unwrap();
        std::fs::write(&b_path, blank_pdf(1)).unwrap();

        let records = vec![
            record("https://p.com/a", a_path, "Hello World", "news"),
            record("https://p.com/b", b_path, "", "Sports"),
        ];
        let descriptors: Vec<ContentDescriptor> = records
            .iter()
            .map(|r| ContentDescriptor::from_record(r).unwrap())
            .collect();

        let mut adapter = FileCaptureAdapter::new(&records);
        match assemble_issue(&mut adapter, descriptors, None, meta(name)).await {
            AssemblyOutcome::Assembled(issue) => issue,
            AssemblyOutcome::NoContent => panic!("fixture should assemble"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_package_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let issue = assemble_fixture("test_issue", dir.path()).await;
        assert_eq!(issue.total_pages, 3);

        let bundle = build_package(issue, false, 150).await.unwrap();

        // merged PDF page count == sum of unit page counts == ALTO count
        let merged = Document::load_mem(&bundle.pdf).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
        assert_eq!(bundle.alto.len(), 3);

        // text lands on the first unit's start page only
        assert!(
            bundle.alto[0]
                .xml
                .contains("<alto:String>Hello World</alto:String>")
        );
        assert!(!bundle.alto[1].xml.contains("TextBlock"));
        assert!(!bundle.alto[2].xml.contains("TextBlock"));

        // METS references every ALTO file and both constituents
        assert!(bundle.mets.contains("file://./alto/alto_0003.xml"));
        assert!(bundle.mets.contains("<mods:list>p. 1 - 2</mods:list>"));
        assert!(bundle.mets.contains("<mods:list>p. 3</mods:list>"));
        assert!(bundle.mets.contains("Vol. CXLVII, No. 5 (Mar 12, 2023)"));
    }

    #[tokio::test]
    async fn test_rerun_reproduces_identical_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let issue = assemble_fixture("fixed_name", dir.path()).await;
            build_package(issue, false, 150).await.unwrap()
        };
        let second = {
            let issue = assemble_fixture("fixed_name", dir.path()).await;
            build_package(issue, false, 150).await.unwrap()
        };

        assert_eq!(first.pdf, second.pdf);
        let first_alto: Vec<&str> = first.alto.iter().map(|p| p.xml.as_str()).collect();
        let second_alto: Vec<&str> = second.alto.iter().map(|p| p.xml.as_str()).collect();
        assert_eq!(first_alto, second_alto);
        // METS may differ only in CREATEDATE
        let strip = |s: &str| {
            let start = s.find("CREATEDATE=\"").unwrap();
            let end = start + s[start..].find("Z\"").unwrap() + 2;
            format!("{}{}", &s[..start], &s[end..])
        };
        assert_eq!(strip(&first.mets), strip(&second.mets));
    }

    #[tokio::test]
    async fn test_written_tree_matches_mets_hrefs() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let issue = assemble_fixture("tree_issue", scratch.path()).await;
        let bundle = build_package(issue, false, 150).await.unwrap();
        bundle.write_to_dir(out.path()).await.unwrap();

        assert!(out.path().join("tree_issue.pdf").is_file());
        assert!(out.path().join("mets.xml").is_file());
        for page in 1..=3 {
            assert!(
                out.path()
                    .join(format!("alto/alto_{:04}.xml", page))
                    .is_file()
            );
        }
    }

    #[tokio::test]
    async fn test_file_adapter_counts_pages_from_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        std::fs::write(&path, blank_pdf(3)).unwrap();
        let records = vec![record("https://p.com/three", path, "", "news")];
        let descriptor = ContentDescriptor::from_record(&records[0]).unwrap();

        let mut adapter = FileCaptureAdapter::new(&records);
        let captured = adapter.capture(&descriptor).await.unwrap();
        assert_eq!(captured.page_count, 3);
    }
}
