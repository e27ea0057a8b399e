// Metrics module - Prometheus-compatible metrics tracking
// Counters and latency percentiles for the transformation server

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Percentile statistics for latency measurements
#[derive(Debug, Clone, Copy)]
pub struct Histogram {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 404, 500)
    status_counts: Mutex<HashMap<u16, u64>>,

    // Transformation action counters (resize, crop, json, ...)
    action_counts: Mutex<HashMap<String, u64>>,

    // Source backend counters (local, s3, youtube, ...)
    source_counts: Mutex<HashMap<String, u64>>,

    // Error kind counters (not_found, codec_failure, ...)
    error_counts: Mutex<HashMap<String, u64>>,

    // Request duration tracking (stored in microseconds as u64)
    durations: Mutex<Vec<u64>>,

    // Byte accounting across optimization
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(HashMap::new()),
            action_counts: Mutex::new(HashMap::new()),
            source_counts: Mutex::new(HashMap::new()),
            error_counts: Mutex::new(HashMap::new()),
            durations: Mutex::new(Vec::new()),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
        }
    }

    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_count(&self, status_code: u16) {
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status_code).or_insert(0) += 1;
        }
    }

    pub fn increment_action_count(&self, action: &str) {
        if let Ok(mut counts) = self.action_counts.lock() {
            *counts.entry(action.to_string()).or_insert(0) += 1;
        }
    }

    pub fn increment_source_count(&self, source: &str) {
        if let Ok(mut counts) = self.source_counts.lock() {
            *counts.entry(source.to_string()).or_insert(0) += 1;
        }
    }

    pub fn increment_error_count(&self, kind: &str) {
        if let Ok(mut counts) = self.error_counts.lock() {
            *counts.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a request duration in milliseconds
    pub fn record_duration(&self, duration_ms: f64) {
        let duration_us = (duration_ms * 1000.0) as u64;
        if let Ok(mut durations) = self.durations.lock() {
            durations.push(duration_us);
        }
    }

    /// Record byte counts before and after optimization
    pub fn record_bytes(&self, bytes_in: u64, bytes_out: u64) {
        self.bytes_in.fetch_add(bytes_in, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes_out, Ordering::Relaxed);
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn get_status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(&status_code).copied())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn get_action_count(&self, action: &str) -> u64 {
        self.action_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(action).copied())
            .unwrap_or(0)
    }

    pub fn get_duration_histogram(&self) -> Histogram {
        if let Ok(durations) = self.durations.lock() {
            calculate_histogram(&durations)
        } else {
            Histogram {
                p50: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
            }
        }
    }

    /// Export all metrics in Prometheus text exposition format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP image_requests_total Total number of image requests received\n");
        output.push_str("# TYPE image_requests_total counter\n");
        output.push_str(&format!(
            "image_requests_total {}\n",
            self.request_count.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP image_requests_by_status_total Image requests by status code\n");
        output.push_str("# TYPE image_requests_by_status_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort_by_key(|(status, _)| **status);
            for (status, count) in entries {
                output.push_str(&format!(
                    "image_requests_by_status_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output.push_str("\n# HELP image_requests_by_action_total Image requests by transformation action\n");
        output.push_str("# TYPE image_requests_by_action_total counter\n");
        if let Ok(counts) = self.action_counts.lock() {
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort_by_key(|(action, _)| action.as_str());
            for (action, count) in entries {
                output.push_str(&format!(
                    "image_requests_by_action_total{{action=\"{}\"}} {}\n",
                    action, count
                ));
            }
        }

        output.push_str("\n# HELP image_requests_by_source_total Image requests by source backend\n");
        output.push_str("# TYPE image_requests_by_source_total counter\n");
        if let Ok(counts) = self.source_counts.lock() {
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort_by_key(|(source, _)| source.as_str());
            for (source, count) in entries {
                output.push_str(&format!(
                    "image_requests_by_source_total{{source=\"{}\"}} {}\n",
                    source, count
                ));
            }
        }

        output.push_str("\n# HELP image_errors_total Pipeline errors by kind\n");
        output.push_str("# TYPE image_errors_total counter\n");
        if let Ok(counts) = self.error_counts.lock() {
            let mut entries: Vec<_> = counts.iter().collect();
            entries.sort_by_key(|(kind, _)| kind.as_str());
            for (kind, count) in entries {
                output.push_str(&format!(
                    "image_errors_total{{kind=\"{}\"}} {}\n",
                    kind, count
                ));
            }
        }

        let histogram = self.get_duration_histogram();
        output.push_str("\n# HELP image_request_duration_ms Request duration percentiles in milliseconds\n");
        output.push_str("# TYPE image_request_duration_ms summary\n");
        output.push_str(&format!(
            "image_request_duration_ms{{quantile=\"0.5\"}} {:.3}\n",
            histogram.p50
        ));
        output.push_str(&format!(
            "image_request_duration_ms{{quantile=\"0.9\"}} {:.3}\n",
            histogram.p90
        ));
        output.push_str(&format!(
            "image_request_duration_ms{{quantile=\"0.95\"}} {:.3}\n",
            histogram.p95
        ));
        output.push_str(&format!(
            "image_request_duration_ms{{quantile=\"0.99\"}} {:.3}\n",
            histogram.p99
        ));

        output.push_str("\n# HELP image_bytes_in_total Bytes fetched from sources\n");
        output.push_str("# TYPE image_bytes_in_total counter\n");
        output.push_str(&format!(
            "image_bytes_in_total {}\n",
            self.bytes_in.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP image_bytes_out_total Bytes served after optimization\n");
        output.push_str("# TYPE image_bytes_out_total counter\n");
        output.push_str(&format!(
            "image_bytes_out_total {}\n",
            self.bytes_out.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn calculate_histogram(samples: &[u64]) -> Histogram {
    if samples.is_empty() {
        return Histogram {
            p50: 0.0,
            p90: 0.0,
            p95: 0.0,
            p99: 0.0,
        };
    }

    let mut sorted: Vec<u64> = samples.to_vec();
    sorted.sort_unstable();

    let p50_idx = (sorted.len() as f64 * 0.50) as usize;
    let p90_idx = (sorted.len() as f64 * 0.90) as usize;
    let p95_idx = (sorted.len() as f64 * 0.95) as usize;
    let p99_idx = (sorted.len() as f64 * 0.99) as usize;

    // Convert from microseconds to milliseconds
    Histogram {
        p50: sorted.get(p50_idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0,
        p90: sorted.get(p90_idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0,
        p95: sorted.get(p95_idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0,
        p99: sorted.get(p99_idx.saturating_sub(1)).copied().unwrap_or(0) as f64 / 1000.0,
    }
}
