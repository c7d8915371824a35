//! Sliding window of recent probe outcomes.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

use super::models::{serialize_secs, Outcome};

/// Aggregates computed over the current window contents.
///
/// An empty window yields all-zero figures; check [`WindowedStats::is_empty`]
/// before treating a zero rate as a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowedStats {
    pub request_count: usize,
    pub success_count: usize,
    pub available_count: usize,
    #[serde(rename = "avg_latency_secs", serialize_with = "serialize_secs")]
    pub avg_latency: Duration,
    #[serde(rename = "min_latency_secs", serialize_with = "serialize_secs")]
    pub min_latency: Duration,
    #[serde(rename = "max_latency_secs", serialize_with = "serialize_secs")]
    pub max_latency: Duration,
    /// Percentage of requests that returned 200.
    pub success_rate: f64,
    /// Percentage of requests that received any response.
    pub availability: f64,
    /// Time between the oldest and newest sample.
    #[serde(rename = "span_secs", serialize_with = "serialize_secs")]
    pub span: Duration,
}

impl WindowedStats {
    pub fn is_empty(&self) -> bool {
        self.request_count == 0
    }
}

/// Fixed-capacity FIFO of outcomes. The oldest entry is evicted on overflow.
#[derive(Debug, Clone)]
pub struct StatisticsWindow {
    samples: VecDeque<Outcome>,
    capacity: usize,
}

impl StatisticsWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, outcome: Outcome) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(outcome);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Outcomes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.samples.iter()
    }

    pub fn aggregate(&self) -> WindowedStats {
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return WindowedStats::default();
        };

        let request_count = self.len();
        let mut success_count = 0;
        let mut available_count = 0;
        let mut total = Duration::ZERO;
        let mut min_latency = Duration::MAX;
        let mut max_latency = Duration::ZERO;

        for outcome in self.iter() {
            if outcome.is_success() {
                success_count += 1;
            }
            if outcome.is_available() {
                available_count += 1;
            }
            total += outcome.elapsed;
            min_latency = min_latency.min(outcome.elapsed);
            max_latency = max_latency.max(outcome.elapsed);
        }

        WindowedStats {
            request_count,
            success_count,
            available_count,
            avg_latency: total / request_count as u32,
            min_latency,
            max_latency,
            success_rate: success_count as f64 / request_count as f64 * 100.0,
            availability: available_count as f64 / request_count as f64 * 100.0,
            span: (newest.timestamp - oldest.timestamp).to_std().unwrap_or_default(),
        }
    }
}
