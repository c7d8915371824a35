//! Threshold evaluation for each monitored condition.
//!
//! Every evaluator is a pure function of the current outcome, the window
//! snapshot and the target's thresholds.

use super::models::{ConditionId, Outcome, Severity, Target};
use super::window::WindowedStats;

/// Classification of one condition for one check.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Normal { message: String },
    Abnormal { severity: Severity, message: String },
    /// Not enough samples to judge; no state changes. Rate conditions wait
    /// for `consecutive_threshold` outcomes, latency for one response.
    InsufficientData { samples: usize, required: usize },
}

impl Evaluation {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Evaluation::Abnormal { .. })
    }
}

/// Evaluate a single condition.
pub fn evaluate(
    condition: ConditionId,
    target: &Target,
    outcome: &Outcome,
    stats: &WindowedStats,
) -> Evaluation {
    match condition {
        ConditionId::StatusCode => evaluate_status_code(outcome),
        ConditionId::Latency => evaluate_latency(target, outcome),
        ConditionId::SuccessRate => evaluate_success_rate(target, stats),
        ConditionId::Availability => evaluate_availability(target, stats),
    }
}

/// Severity for a non-200 status. `None` is a request that never completed.
pub fn status_severity(status_code: Option<u16>) -> Severity {
    match status_code {
        Some(401 | 403 | 404 | 429) => Severity::Warning,
        Some(500 | 502 | 503 | 504) => Severity::Error,
        _ => Severity::Error,
    }
}

pub fn evaluate_status_code(outcome: &Outcome) -> Evaluation {
    match outcome.status_code {
        Some(200) => Evaluation::Normal {
            message: "API status code has returned to 200".to_string(),
        },
        Some(code) => Evaluation::Abnormal {
            severity: status_severity(Some(code)),
            message: format!("API returned non-200 status code {}", code),
        },
        None => Evaluation::Abnormal {
            severity: status_severity(None),
            message: format!(
                "API unreachable: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        },
    }
}

/// Warning and critical share one slot; the tighter breach sets severity.
///
/// A failed probe has no response time. It is left to the status code
/// condition and does not move the latency state.
pub fn evaluate_latency(target: &Target, outcome: &Outcome) -> Evaluation {
    if outcome.status_code.is_none() {
        return Evaluation::InsufficientData {
            samples: 0,
            required: 1,
        };
    }

    let elapsed = outcome.elapsed.as_secs_f64();

    if outcome.elapsed > target.critical_latency {
        Evaluation::Abnormal {
            severity: Severity::Error,
            message: format!(
                "Response time ({:.3}s) exceeds critical threshold ({:.3}s)",
                elapsed,
                target.critical_latency.as_secs_f64()
            ),
        }
    } else if outcome.elapsed > target.warning_latency {
        Evaluation::Abnormal {
            severity: Severity::Warning,
            message: format!(
                "Response time ({:.3}s) exceeds warning threshold ({:.3}s)",
                elapsed,
                target.warning_latency.as_secs_f64()
            ),
        }
    } else {
        Evaluation::Normal {
            message: format!("Response time has returned to normal: {:.3}s", elapsed),
        }
    }
}

pub fn evaluate_success_rate(target: &Target, stats: &WindowedStats) -> Evaluation {
    evaluate_rate(
        "Success rate",
        stats.success_rate,
        target.success_rate_threshold,
        target,
        stats,
    )
}

pub fn evaluate_availability(target: &Target, stats: &WindowedStats) -> Evaluation {
    evaluate_rate(
        "Availability",
        stats.availability,
        target.availability_threshold,
        target,
        stats,
    )
}

fn evaluate_rate(
    label: &str,
    value: f64,
    threshold: f64,
    target: &Target,
    stats: &WindowedStats,
) -> Evaluation {
    let required = target.consecutive_threshold as usize;
    if stats.request_count < required {
        return Evaluation::InsufficientData {
            samples: stats.request_count,
            required,
        };
    }

    if value < threshold {
        Evaluation::Abnormal {
            severity: Severity::Warning,
            message: format!(
                "{} ({:.1}%) is below threshold ({:.1}%) over the last {} requests",
                label, value, threshold, stats.request_count
            ),
        }
    } else {
        Evaluation::Normal {
            message: format!("{} has returned to normal: {:.1}%", label, value),
        }
    }
}
