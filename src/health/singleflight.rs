// src/health/singleflight.rs
//! Collapses concurrent health check requests into one in-flight pass.
//!
//! The process serves a single class of check, so there is exactly one slot.
//! While a pass is running every new caller subscribes to its result instead
//! of starting another one. Once the pass completes the slot is cleared and
//! the next caller starts a fresh pass.

use super::result::CheckResult;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

type Slot = Option<broadcast::Sender<Arc<CheckResult>>>;

#[derive(Debug, thiserror::Error)]
pub enum SingleflightError {
    #[error("health check pass aborted before producing a result")]
    PassAborted,
}

/// Result handed to one caller.
#[derive(Debug, Clone)]
pub struct Flight {
    pub result: Arc<CheckResult>,
    /// The caller waited on a pass started by another request.
    pub joined: bool,
}

pub struct Singleflight {
    enabled: bool,
    in_flight: Arc<Mutex<Slot>>,
}

impl Singleflight {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `pass`, or wait for the pass already in flight.
    ///
    /// The leading pass is spawned onto its own task, so a caller going away
    /// never strands the others waiting on it. When disabled every call runs
    /// its own pass inline.
    pub async fn run<F, Fut>(&self, pass: F) -> Result<Flight, SingleflightError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        if !self.enabled {
            return Ok(Flight {
                result: Arc::new(pass().await),
                joined: false,
            });
        }

        let (mut rx, leader) = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(tx) => (tx.subscribe(), false),
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *slot = Some(tx);
                    (rx, true)
                }
            }
        };

        if leader {
            let guard = InFlightGuard {
                slot: Some(self.in_flight.clone()),
            };
            let pass = pass();
            tokio::spawn(async move {
                let result = Arc::new(pass.await);
                guard.complete(result);
            });
        }

        match rx.recv().await {
            Ok(result) => Ok(Flight {
                result,
                joined: !leader,
            }),
            Err(_) => Err(SingleflightError::PassAborted),
        }
    }
}

/// Clears the slot when the leading pass finishes or dies.
struct InFlightGuard {
    slot: Option<Arc<Mutex<Slot>>>,
}

impl InFlightGuard {
    fn complete(mut self, result: Arc<CheckResult>) {
        if let Some(slot) = self.slot.take() {
            if let Some(tx) = lock(&slot).take() {
                // No receivers left just means every caller went away.
                let _ = tx.send(result);
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            // Dropping the sender wakes waiters with an error.
            lock(&slot).take();
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
