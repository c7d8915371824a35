//! Core model types shared by the engine, the prober and the notifiers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::WindowedStats;

/// A monitored HTTP endpoint with its resolved thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub warning_latency: Duration,
    pub critical_latency: Duration,
    /// Minimum acceptable success rate, in percent.
    pub success_rate_threshold: f64,
    /// Minimum acceptable availability, in percent.
    pub availability_threshold: f64,
    pub window_size: usize,
    pub consecutive_threshold: u32,
    pub cooldown: Duration,
}

/// The result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Absent when the request never completed (timeout, DNS, connection).
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl Outcome {
    /// An outcome for a request that received a response.
    pub fn completed(timestamp: DateTime<Utc>, elapsed: Duration, status_code: u16) -> Self {
        Self {
            timestamp,
            elapsed,
            status_code: Some(status_code),
            error: None,
        }
    }

    /// An outcome for a request that failed before a response arrived.
    pub fn failed(timestamp: DateTime<Utc>, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            elapsed,
            status_code: None,
            error: Some(error.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status_code.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.status_code == Some(200)
    }
}

/// The monitored health conditions, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionId {
    StatusCode,
    Latency,
    SuccessRate,
    Availability,
}

impl ConditionId {
    pub const ALL: [ConditionId; 4] = [
        ConditionId::StatusCode,
        ConditionId::Latency,
        ConditionId::SuccessRate,
        ConditionId::Availability,
    ];

    pub fn index(self) -> usize {
        match self {
            ConditionId::StatusCode => 0,
            ConditionId::Latency => 1,
            ConditionId::SuccessRate => 2,
            ConditionId::Availability => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionId::StatusCode => "status_code",
            ConditionId::Latency => "latency",
            ConditionId::SuccessRate => "success_rate",
            ConditionId::Availability => "availability",
        }
    }

    /// Human readable name used in notification text.
    pub fn label(self) -> &'static str {
        match self {
            ConditionId::StatusCode => "Status code",
            ConditionId::Latency => "Response time",
            ConditionId::SuccessRate => "Success rate",
            ConditionId::Availability => "Availability",
        }
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a condition has been abnormal for the configured number of
/// consecutive checks and its cooldown allows a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub target_name: String,
    pub target_url: String,
    pub condition: ConditionId,
    pub severity: Severity,
    pub message: String,
    pub status_code: Option<u16>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub stats: WindowedStats,
    pub timestamp: DateTime<Utc>,
}

/// Raised when an active alert's condition returns to normal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryEvent {
    pub target_name: String,
    pub target_url: String,
    pub condition: ConditionId,
    pub message: String,
    pub stats: WindowedStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Alert(AlertEvent),
    Recovery(RecoveryEvent),
}

impl Event {
    pub fn target_name(&self) -> &str {
        match self {
            Event::Alert(a) => &a.target_name,
            Event::Recovery(r) => &r.target_name,
        }
    }

    pub fn target_url(&self) -> &str {
        match self {
            Event::Alert(a) => &a.target_url,
            Event::Recovery(r) => &r.target_url,
        }
    }

    pub fn condition(&self) -> ConditionId {
        match self {
            Event::Alert(a) => a.condition,
            Event::Recovery(r) => r.condition,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Alert(a) => &a.message,
            Event::Recovery(r) => &r.message,
        }
    }

    pub fn stats(&self) -> &WindowedStats {
        match self {
            Event::Alert(a) => &a.stats,
            Event::Recovery(r) => &r.stats,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::Alert(a) => a.timestamp,
            Event::Recovery(r) => r.timestamp,
        }
    }

    /// "error", "warning" or "recovery".
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Alert(a) => a.severity.as_str(),
            Event::Recovery(_) => "recovery",
        }
    }

    pub fn title(&self) -> String {
        match self {
            Event::Alert(a) => format!("API Monitor Alert: {}", a.target_name),
            Event::Recovery(r) => format!("API Recovery: {}", r.target_name),
        }
    }
}

/// Serialize a duration as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
impl Target {
    /// Target with the stock thresholds: 3s warning, 5s critical,
    /// 95% success rate, 98% availability.
    pub fn sample(name: &str, window_size: usize, consecutive_threshold: u32, cooldown: Duration) -> Self {
        Self {
            name: name.to_string(),
            url: format!("https://{}.example.com/health", name),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(20),
            warning_latency: Duration::from_secs(3),
            critical_latency: Duration::from_secs(5),
            success_rate_threshold: 95.0,
            availability_threshold: 98.0,
            window_size,
            consecutive_threshold,
            cooldown,
        }
    }
}
