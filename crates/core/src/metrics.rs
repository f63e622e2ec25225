//! Prometheus metrics for conversions.
//!
//! This module provides metrics for:
//! - Conversions started and finished, by result
//! - Conversion wall-clock duration
//! - Progress snapshots parsed from ffmpeg

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every metric in this module.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Conversions started total.
pub static CONVERSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidconv_conversions_started_total",
        "Total conversions started",
    )
    .unwrap()
});

/// Conversions finished total by result.
pub static CONVERSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vidconv_conversions_finished_total",
            "Total conversions finished",
        ),
        &["result"], // "success", "conversion_failed", "process_start_failure", "timeout", "cancelled"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vidconv_conversion_duration_seconds",
            "Wall-clock duration of conversions",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["result"],
    )
    .unwrap()
});

/// Progress snapshots parsed total.
pub static PROGRESS_SNAPSHOTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "vidconv_progress_snapshots_total",
        "Total progress snapshots parsed from ffmpeg output",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONVERSIONS_STARTED.clone()))
        .unwrap();
    registry
        .register(Box::new(CONVERSIONS_FINISHED.clone()))
        .unwrap();
    registry
        .register(Box::new(CONVERSION_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_SNAPSHOTS.clone()))
        .unwrap();
}

/// Records the end of a conversion.
pub fn record_finished(result: &str, duration_secs: f64) {
    CONVERSIONS_FINISHED.with_label_values(&[result]).inc();
    CONVERSION_DURATION
        .with_label_values(&[result])
        .observe(duration_secs);
}

/// Encodes all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
