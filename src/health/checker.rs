// src/health/checker.rs
use super::result::{CheckResult, ProbeOutcome};
use crate::metrics::MetricsCollector;
use crate::probe::{Executors, ProbeExecutor, ProbeSpec};
use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runs every configured probe concurrently and aggregates the outcome.
///
/// All probes of a pass share one cancellation token. The first genuine
/// failure records its message and cancels the token, so the rest of the
/// pass finishes as soon as the remaining probes notice. Results are only
/// read after every probe task has been joined.
pub struct HealthChecker<E = Executors> {
    probes: Arc<[ProbeSpec]>,
    executor: Arc<E>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<E: ProbeExecutor> HealthChecker<E> {
    pub fn new(
        probes: Arc<[ProbeSpec]>,
        executor: E,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            probes,
            executor: Arc::new(executor),
            metrics,
        }
    }

    pub async fn run(&self) -> CheckResult {
        let start = Instant::now();
        let pass_id = Uuid::new_v4();
        let span = info_span!("health_check", %pass_id);

        let ctx = CancellationToken::new();
        // Probes still running when this future is dropped get torn down too.
        let _abort_on_drop = ctx.clone().drop_guard();
        let failures: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        info!(parent: &span, probes = self.probes.len(), "Beginning health checks...");

        let mut tasks = Vec::with_capacity(self.probes.len());
        for index in 0..self.probes.len() {
            let probes = self.probes.clone();
            let executor = self.executor.clone();
            let ctx = ctx.clone();
            let failures = failures.clone();

            let task = async move {
                let spec = &probes[index];
                let probe = spec.identifier();
                let kind = spec.kind();

                match executor.execute(&ctx, spec).await {
                    Ok(()) => {
                        info!(%probe, %kind, "probe successful");
                        ProbeOutcome::passed(spec)
                    }
                    Err(err) if err.is_cancellation() => {
                        debug!(%probe, %kind, "probe aborted by shared cancellation");
                        ProbeOutcome::cancelled(spec)
                    }
                    Err(err) => {
                        warn!(%probe, %kind, error = %err, "probe FAILED");
                        let message = spec.failure_message(&err);
                        lock(&failures).push(message.clone());
                        ctx.cancel();
                        ProbeOutcome::failed(spec, message)
                    }
                }
            };
            tasks.push(tokio::spawn(task.instrument(span.clone())));
        }

        let joined = join_all(tasks).await;

        let mut outcomes = Vec::with_capacity(joined.len());
        for (spec, joined) in self.probes.iter().zip(joined) {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!(parent: &span, probe = %spec.identifier(), %err, "probe task did not complete");
                    let message = format!(
                        "{} probe {} did not complete: {}",
                        spec.kind(),
                        spec.identifier(),
                        err
                    );
                    lock(&failures).push(message.clone());
                    outcomes.push(ProbeOutcome::failed(spec, message));
                }
            }
        }

        let failures = std::mem::take(&mut *lock(&failures));
        let result = CheckResult::new(outcomes, failures, start.elapsed());

        if let Some(metrics) = &self.metrics {
            metrics.record_check(&result);
        }

        if result.succeeded {
            info!(parent: &span, elapsed = ?result.elapsed, "All health checks passed.");
        } else {
            info!(
                parent: &span,
                elapsed = ?result.elapsed,
                failures = result.failures.len(),
                "At least one health check failed."
            );
        }

        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
