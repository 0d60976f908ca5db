// src/health/service.rs
use super::checker::HealthChecker;
use super::result::CheckResult;
use super::singleflight::Singleflight;
use crate::metrics::MetricsCollector;
use crate::probe::{Executors, ProbeExecutor};
use crate::server::response::{render, HealthResponse};
use std::sync::Arc;
use tracing::{error, info};

/// Answers one inbound health request: dedup, run, render.
pub struct HealthService<E = Executors> {
    checker: Arc<HealthChecker<E>>,
    singleflight: Singleflight,
    detailed: bool,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<E: ProbeExecutor> HealthService<E> {
    pub fn new(
        checker: HealthChecker<E>,
        singleflight: Singleflight,
        detailed: bool,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            checker: Arc::new(checker),
            singleflight,
            detailed,
            metrics,
        }
    }

    pub async fn check(&self) -> Arc<CheckResult> {
        if self.singleflight.is_enabled() {
            info!("Received inbound request. Performing singleflight health checks...");
        } else {
            info!("Received inbound request. Beginning health checks...");
        }

        let checker = self.checker.clone();
        match self
            .singleflight
            .run(move || async move { checker.run().await })
            .await
        {
            Ok(flight) => {
                if flight.joined {
                    info!("Singleflight health check response was shared between multiple requests.");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_shared();
                    }
                }
                flight.result
            }
            Err(err) => {
                error!(%err, "health check pass did not complete");
                Arc::new(CheckResult::aborted(err.to_string()))
            }
        }
    }

    pub async fn handle(&self) -> HealthResponse {
        let result = self.check().await;
        render(&result, self.detailed)
    }
}
