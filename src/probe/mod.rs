//! Probe module for endpoint checks.
//!
//! A prober turns a target into an [`Outcome`]. Failures are recorded in the
//! outcome, never returned as errors.

mod http;

pub use http::*;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::engine::{Outcome, Target};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Executes one check against a target.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> Outcome;
}

/// Random delay of up to 100ms before a probe.
pub(crate) async fn jitter() {
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;
}
