//! Ingest Phase Metrics
//!
//! Request outcomes, rejection reasons and per-target forwarding results.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::payload::Target;

/// Metrics collection for the ingest pipeline
pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_request() {
        ::metrics::counter!(phase_metric!(counter, "ingest", "requests")).increment(1);
    }

    /// `reason` is one of the decryption error kinds
    pub fn record_decrypt_rejected(reason: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "decrypt_rejected"), "reason" => reason)
            .increment(1);
    }

    pub fn record_validation_rejected(field_count: usize) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "validation_rejected")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "validation_error_fields"))
            .record(field_count as f64);
    }

    pub fn record_forward(target: Target, ok: bool, attempts: u32) {
        let result = if ok { "ok" } else { "failed" };
        ::metrics::counter!(
            phase_metric!(counter, "ingest", "forwards"),
            "target" => target.name(),
            "result" => result
        )
        .increment(1);
        ::metrics::histogram!(
            phase_metric!(histogram, "ingest", "forward_attempts"),
            "target" => target.name()
        )
        .record(attempts as f64);
    }

    /// `class` is `ok`, `partial` or `error`
    pub fn record_outcome(class: &'static str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "ingest", "outcomes"), "class" => class)
            .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "ingest", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for IngestMetrics {
    fn register_metrics() {
        use metrics::{describe_counter, describe_histogram};

        for doc in Self::metrics_documentation() {
            match doc.metric_type {
                MetricType::Counter => describe_counter!(doc.name, doc.help),
                MetricType::Histogram => describe_histogram!(doc.name, doc.help),
                MetricType::Gauge => metrics::describe_gauge!(doc.name, doc.help),
            }
        }
    }

    fn phase_name() -> &'static str {
        "ingest"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "ingest", "requests"),
                metric_type: MetricType::Counter,
                help: "Total number of ingest requests received",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "decrypt_rejected"),
                metric_type: MetricType::Counter,
                help: "Envelopes rejected before validation",
                labels: vec!["reason"],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "validation_rejected"),
                metric_type: MetricType::Counter,
                help: "Decrypted records rejected by validation",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "validation_error_fields"),
                metric_type: MetricType::Histogram,
                help: "Number of field errors per rejected record",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "forwards"),
                metric_type: MetricType::Counter,
                help: "Orion partial updates by target and result",
                labels: vec!["target", "result"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "forward_attempts"),
                metric_type: MetricType::Histogram,
                help: "Attempts spent per Orion partial update",
                labels: vec!["target"],
            },
            MetricDoc {
                name: phase_metric!(counter, "ingest", "outcomes"),
                metric_type: MetricType::Counter,
                help: "Ingest outcomes by class (ok, partial, error)",
                labels: vec!["class"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "ingest", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "End-to-end duration of forwarded ingests in seconds",
                labels: vec![],
            },
        ]
    }
}
