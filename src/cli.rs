//! Command-line interface definitions for the archiver.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use chrono::{NaiveDate, NaiveDateTime};
use clap::Parser;

/// Command-line arguments for the issue assembly pipeline.
///
/// # Examples
///
/// ```sh
/// # Archive today's captures into ./archive
/// prince-archiver -o ./archive -m ./captures/manifest.json --volume 147 --issue 5
///
/// # Rasterize pages too, and emit the wire bundle for the uploader
/// prince-archiver -o ./archive -m ./captures/manifest.json \
///     --volume 147 --issue 5 --images --wire-out ./archive/bundle.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory the archive package tree is written to
    #[arg(short, long)]
    pub output_dir: String,

    /// Path to the capture manifest (JSON list of content descriptor records)
    #[arg(short, long)]
    pub manifest: String,

    /// Issue date (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    pub date: Option<NaiveDate>,

    /// Volume number of the issue
    #[arg(long, env = "PRINCE_VOLUME")]
    pub volume: u32,

    /// Issue number within the volume
    #[arg(long, env = "PRINCE_ISSUE")]
    pub issue: u32,

    /// Override the timestamped issue name (re-running with the same name
    /// and inputs reproduces the same package)
    #[arg(long)]
    pub issue_name: Option<String>,

    /// Also rasterize every page to a PNG image
    #[arg(long)]
    pub images: bool,

    /// DPI used for page geometry and rasterization
    #[arg(long, default_value_t = 150)]
    pub dpi: u32,

    /// Newsletter window start, inclusive (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub newsletters_from: Option<NaiveDateTime>,

    /// Newsletter window end, exclusive (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    pub newsletters_until: Option<NaiveDateTime>,

    /// Also write the base64 wire bundle JSON to this path
    #[arg(long)]
    pub wire_out: Option<String>,
}
