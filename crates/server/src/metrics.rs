//! Prometheus counters for calculator operations, served at `/metrics`.
//!
//! Collected metrics (prefix from `Settings::metrics_prefix`):
//! - `<prefix>_operation_total{operation, status}`: calls per operation token,
//!   `status` is `success` or `error`
//! - `<prefix>_operation_duration_ms{operation}`: latency of successful calls

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

const DURATION_BUCKETS_MS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0];

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    operations: IntCounterVec,
    duration_ms: HistogramVec,
}

impl Metrics {
    pub fn new(prefix: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let operations = IntCounterVec::new(
            Opts::new(
                format!("{prefix}_operation_total"),
                "Number of calculator operations handled",
            ),
            &["operation", "status"],
        )?;
        let duration_ms = HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_operation_duration_ms"),
                "Duration of successful calculator operations in milliseconds",
            )
            .buckets(DURATION_BUCKETS_MS.to_vec()),
            &["operation"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration_ms.clone()))?;

        Ok(Self {
            registry,
            operations,
            duration_ms,
        })
    }

    pub fn observe(&self, operation: &str, succeeded: bool, elapsed: Duration) {
        let status = if succeeded { "success" } else { "error" };
        self.operations
            .with_label_values(&[operation, status])
            .inc();
        if succeeded {
            self.duration_ms
                .with_label_values(&[operation])
                .observe(elapsed.as_secs_f64() * 1000.0);
        }
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
