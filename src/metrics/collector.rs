// src/metrics/collector.rs
use crate::health::CheckResult;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(%err, "failed to encode metrics");
        }
        buffer
    }
}

pub struct MetricsCollector {
    // Pass metrics
    pub checks_total: IntCounterVec,
    pub check_duration_seconds: Histogram,

    // Probe metrics
    pub probe_results_total: IntCounterVec,

    // Singleflight metrics
    pub singleflight_shared_total: IntCounter,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let checks_total = IntCounterVec::new(
            Opts::new("health_checks_total", "Total number of health check passes"),
            &["result"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let check_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_check_duration_seconds",
            "Wall-clock duration of a health check pass in seconds",
        ))?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let probe_results_total = IntCounterVec::new(
            Opts::new(
                "health_probe_results_total",
                "Probe outcomes by kind (passed, failed, cancelled)",
            ),
            &["kind", "result"],
        )?;
        registry.register(Box::new(probe_results_total.clone()))?;

        let singleflight_shared_total = IntCounter::new(
            "health_singleflight_shared_total",
            "Requests answered with the result of a pass started by another request",
        )?;
        registry.register(Box::new(singleflight_shared_total.clone()))?;

        Ok(Self {
            checks_total,
            check_duration_seconds,
            probe_results_total,
            singleflight_shared_total,
        })
    }

    pub fn record_check(&self, result: &CheckResult) {
        let label = if result.succeeded { "success" } else { "failure" };
        self.checks_total.with_label_values(&[label]).inc();
        self.check_duration_seconds
            .observe(result.elapsed.as_secs_f64());

        for outcome in &result.outcomes {
            self.probe_results_total
                .with_label_values(&[outcome.kind.as_str(), outcome.label()])
                .inc();
        }
    }

    pub fn record_shared(&self) {
        self.singleflight_shared_total.inc();
    }
}
