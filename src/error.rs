//! Error types for the issue assembly pipeline.
//!
//! Per-unit capture failures are soft: they are logged and contained inside
//! the assembler and never surface here. [`ArchiveError`] covers the fatal
//! stage-level failures (merge, rasterization, ALTO, METS, packaging) that
//! abort the whole issue, so that an orchestration layer can distinguish
//! "nothing to archive" (a non-error outcome) from "archive generation broke".

use thiserror::Error;

/// Fatal errors raised by the assembly stages.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The merged PDF's page count disagrees with the sum of the captured
    /// units' page counts. Indicates a corrupted capture or a non-PDF
    /// buffer that slipped through the adapter.
    #[error("merged PDF has {actual} pages but captures reported {expected}")]
    MergeInconsistency { expected: usize, actual: usize },

    /// A captured buffer could not be parsed as a PDF.
    #[error("captured buffer is not a readable PDF: {0}")]
    InvalidPdf(#[from] lopdf::Error),

    /// The merged document could not be built (e.g. an input without a
    /// page tree or catalog).
    #[error("PDF merge failed: {0}")]
    Merge(String),

    /// Page rasterization failed. Only reachable when images were requested.
    #[error("image conversion failed: {0}")]
    ImageConversion(String),

    /// ALTO text-layer generation failed.
    #[error("ALTO generation failed: {0}")]
    AltoGeneration(String),

    /// METS manifest generation failed.
    #[error("METS generation failed: {0}")]
    MetsGeneration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
