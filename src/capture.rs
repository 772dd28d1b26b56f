//! Content capture seam with bounded-retry support.
//!
//! Browser-driven page rendering is an external collaborator: it owns the
//! browser, its timeouts, and its release-on-exit semantics. This module
//! defines the boundary the pipeline sees:
//! - [`CaptureAdapter`]: the trait every capture backend implements
//! - [`RetryCapture`]: a decorator adding bounded retries with exponential
//!   backoff and jitter to any adapter, parameterized by the caller
//! - [`FileCaptureAdapter`]: a replay backend that serves pre-rendered PDFs
//!   from disk, used by the binary and the tests
//!
//! Capture is sequential and single-owner: the adapter is taken by `&mut`
//! so one rendering resource serves the whole run, one unit at a time, and
//! is released when the adapter goes out of scope.
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::models::{CapturedUnit, ContentDescriptor};
use lopdf::Document;
use rand::{Rng, rng};
use std::collections::HashMap;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// A capture backend: resolves one content descriptor to a rendered PDF
/// plus extracted plain text.
pub trait CaptureAdapter {
    async fn capture(&mut self, descriptor: &ContentDescriptor)
    -> Result<CapturedUnit, Box<dyn Error>>;
}

/// Decorator that adds bounded-retry logic to any [`CaptureAdapter`].
///
/// Transient renderer failures (navigation timeouts, dropped browser
/// connections) are retried up to `max_retries` times; the terminal error
/// is surfaced to the assembler, which treats it as a soft per-unit failure.
pub struct RetryCapture<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryCapture<T>
where
    T: CaptureAdapter,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<T> CaptureAdapter for RetryCapture<T>
where
    T: CaptureAdapter,
{
    #[instrument(level = "info", skip_all, fields(url = %descriptor.url))]
    async fn capture(
        &mut self,
        descriptor: &ContentDescriptor,
    ) -> Result<CapturedUnit, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.capture(descriptor).await {
                Ok(unit) => {
                    return Ok(unit);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "capture exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "capture attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Capture backend that replays pre-rendered PDFs from disk.
///
/// Each manifest row may carry a `pdf` path pointing at the capture a
/// browser run already produced for that URL. The page count is read from
/// the PDF itself rather than trusted from the manifest.
pub struct FileCaptureAdapter {
    captures: HashMap<String, (Option<String>, Option<String>, std::path::PathBuf)>,
}

impl FileCaptureAdapter {
    /// Index manifest rows by their (normalized) URL.
    pub fn new(records: &[crate::models::DescriptorRecord]) -> Self {
        let mut captures = HashMap::new();
        for record in records {
            let Some(pdf) = record.pdf.clone() else {
                continue;
            };
            let key = Url::parse(&record.url)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| record.url.clone());
            captures.insert(key, (record.title.clone(), record.text.clone(), pdf));
        }
        Self { captures }
    }
}

impl CaptureAdapter for FileCaptureAdapter {
    #[instrument(level = "info", skip_all, fields(url = %descriptor.url))]
    async fn capture(
        &mut self,
        descriptor: &ContentDescriptor,
    ) -> Result<CapturedUnit, Box<dyn Error>> {
        let (title, text, pdf_path) = self
            .captures
            .get(&descriptor.url)
            .ok_or("no pre-rendered capture recorded for URL")?;

        let pdf = tokio::fs::read(pdf_path).await?;
        let page_count = Document::load_mem(&pdf)?.get_pages().len();
        debug!(page_count, bytes = pdf.len(), "Loaded pre-rendered capture");

        let title = descriptor
            .title
            .clone()
            .or_else(|| title.clone())
            .unwrap_or_else(|| descriptor.url.clone());

        Ok(CapturedUnit {
            url: descriptor.url.clone(),
            title,
            plain_text: text.clone().unwrap_or_default(),
            pdf,
            page_count,
        })
    }
}
