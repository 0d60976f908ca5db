// src/health/mod.rs
mod checker;
mod result;
mod service;
mod singleflight;

pub use checker::HealthChecker;
pub use result::{CheckResult, ProbeOutcome};
pub use service::HealthService;
pub use singleflight::{Flight, Singleflight, SingleflightError};
