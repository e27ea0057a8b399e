//! Per-request context
//!
//! One [`RequestContext`] is created per inbound request and moved through
//! the pipeline by value, so exactly one stage owns it at any instant. The
//! error slot is set-once: later stages see it and pass through untouched.

use std::time::Instant;

use bytes::Bytes;
use uuid::Uuid;

use crate::codec::format::{ImageFormat, OutputFormat};
use crate::codec::ImageMetadata;
use crate::config::Config;
use crate::directive::{self, TransformDirective};
use crate::error::PipelineError;

/// Append-only timing/diagnostic log, flushed as one structured event when
/// the response goes out.
#[derive(Debug)]
pub struct RequestLog {
    started: Instant,
    entries: Vec<String>,
    flushed: bool,
}

impl RequestLog {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Vec::new(),
            flushed: false,
        }
    }

    /// Append a diagnostic entry.
    pub fn note(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Append a timing entry for a completed unit of work.
    pub fn timing(&mut self, label: &str, started: Instant) {
        self.entries
            .push(format!("{}: {}ms", label, started.elapsed().as_millis()));
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Emit the accumulated entries as a single structured event. Safe to
    /// call more than once; only the first call emits.
    pub fn flush(&mut self, request_id: &str, path: &str, status: u16) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        tracing::info!(
            request_id = %request_id,
            path = %path,
            status = status,
            duration_ms = self.elapsed_ms() as u64,
            entries = ?self.entries,
            "request complete"
        );
    }
}

/// The mutable state threaded through every pipeline stage.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    raw_path: String,
    image_name: String,
    source_path: String,
    directive: TransformDirective,
    input_format: Option<ImageFormat>,
    content: Option<Bytes>,
    metadata: Option<ImageMetadata>,
    error: Option<PipelineError>,
    original_byte_length: usize,
    expiry_seconds: u64,
    log: RequestLog,
}

impl RequestContext {
    /// Create a context for an inbound request path. Directive parsing is
    /// total, so this never fails.
    pub fn new(path: &str, config: &Config) -> Self {
        let parsed = directive::parse(path, &config.presets, &config.parser_limits());

        Self {
            request_id: Uuid::new_v4().to_string(),
            raw_path: path.to_string(),
            image_name: parsed.image_name,
            source_path: parsed.source_path,
            directive: parsed.directive,
            input_format: None,
            content: None,
            metadata: None,
            error: None,
            original_byte_length: 0,
            expiry_seconds: config.images.expiry_seconds,
            log: RequestLog::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn directive(&self) -> &TransformDirective {
        &self.directive
    }

    pub fn input_format(&self) -> Option<ImageFormat> {
        self.input_format
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.metadata.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn original_byte_length(&self) -> usize {
        self.original_byte_length
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Shorter expiries come from sources whose upstream content mutates.
    pub fn set_expiry(&mut self, seconds: u64) {
        self.expiry_seconds = seconds;
    }

    /// Record a failure. The first error wins; later calls are ignored so
    /// error state stays sticky and monotonic.
    pub fn fail(&mut self, error: PipelineError) {
        if self.error.is_none() {
            self.log.note(format!("error: {}", error));
            self.error = Some(error);
        }
    }

    /// Store freshly fetched bytes, detecting and validating the input
    /// format from the content itself.
    pub fn set_content(&mut self, bytes: Bytes) {
        self.original_byte_length = bytes.len();

        match ImageFormat::detect(&bytes) {
            Some(format) => {
                self.input_format = Some(format);
                self.content = Some(bytes);
            }
            None => {
                self.fail(PipelineError::UnsupportedFormat {
                    format: "unknown".to_string(),
                });
            }
        }
    }

    /// Swap in transformed bytes without re-running format detection; the
    /// input format was fixed at fetch time.
    pub fn replace_content(&mut self, bytes: Bytes) {
        self.content = Some(bytes);
    }

    pub fn set_metadata(&mut self, metadata: ImageMetadata) {
        self.metadata = Some(metadata);
    }

    /// The format the optimize stage encodes to: the directive's explicit
    /// override, else the input format's default encodable counterpart.
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.directive
            .output_format
            .or_else(|| self.input_format.map(|f| f.default_output()))
    }

    pub fn content_length(&self) -> usize {
        self.content.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    /// Percentage saved by optimization relative to the fetched original.
    pub fn size_saving(&self) -> f64 {
        if self.original_byte_length == 0 {
            return 0.0;
        }
        let saved = self.original_byte_length as f64 - self.content_length() as f64;
        (saved / self.original_byte_length as f64) * 100.0
    }

    pub fn log_mut(&mut self) -> &mut RequestLog {
        &mut self.log
    }
}
