//! Alert engine: windowed statistics, condition evaluation and alert state.
//!
//! The engine never performs I/O. Each call to [`AlertEngine::ingest`] takes
//! one probe outcome for one target and returns the notifications that the
//! outcome caused.

mod condition;
mod models;
mod tracker;
mod window;

pub use condition::*;
pub use models::*;
pub use tracker::*;
pub use window::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Window and condition state for a single target.
#[derive(Debug, Clone)]
pub struct TargetMonitor {
    window: StatisticsWindow,
    tracker: AlertStateTracker,
}

impl TargetMonitor {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: StatisticsWindow::new(window_size),
            tracker: AlertStateTracker::new(),
        }
    }

    pub fn stats(&self) -> WindowedStats {
        self.window.aggregate()
    }

    pub fn tracker(&self) -> &AlertStateTracker {
        &self.tracker
    }

    /// Record one outcome and evaluate every condition against the same snapshot.
    pub fn ingest(&mut self, target: &Target, outcome: Outcome) -> Vec<Event> {
        self.window.append(outcome.clone());
        let stats = self.window.aggregate();
        let policy = AlertPolicy::from(target);

        log_check(target, &outcome, &stats);

        let mut events = Vec::new();
        for condition in ConditionId::ALL {
            let evaluation = evaluate(condition, target, &outcome, &stats);
            let transition = self
                .tracker
                .transition(condition, &evaluation, &policy, outcome.timestamp);
            let count = self.tracker.state(condition).consecutive_count;

            match (transition, evaluation) {
                (
                    Transition::Triggered | Transition::Reminder,
                    Evaluation::Abnormal { severity, message },
                ) => {
                    tracing::warn!(
                        "[{}] {} alert ({}): {} for {} consecutive checks",
                        target.name,
                        condition,
                        severity,
                        message,
                        count
                    );
                    events.push(Event::Alert(AlertEvent {
                        target_name: target.name.clone(),
                        target_url: target.url.clone(),
                        condition,
                        severity,
                        message: format!("{} for {} consecutive checks", message, count),
                        status_code: outcome.status_code,
                        elapsed: outcome.elapsed,
                        stats: stats.clone(),
                        timestamp: outcome.timestamp,
                    }));
                }
                (Transition::Recovered, Evaluation::Normal { message }) => {
                    tracing::info!("[{}] {} recovered: {}", target.name, condition, message);
                    events.push(Event::Recovery(RecoveryEvent {
                        target_name: target.name.clone(),
                        target_url: target.url.clone(),
                        condition,
                        message,
                        stats: stats.clone(),
                        timestamp: outcome.timestamp,
                    }));
                }
                (Transition::Suppressed, _) => {
                    tracing::info!(
                        "Alert suppressed for {} ({}) due to cooldown",
                        target.name,
                        condition
                    );
                }
                (Transition::RecoverySuppressed, _) => {
                    tracing::info!(
                        "Recovery notice suppressed for {} ({}) due to cooldown",
                        target.name,
                        condition
                    );
                }
                (Transition::Degrading, _) => {
                    tracing::debug!(
                        "[{}] {} abnormal ({}/{})",
                        target.name,
                        condition,
                        count,
                        target.consecutive_threshold
                    );
                }
                (_, Evaluation::InsufficientData { samples, required }) => {
                    tracing::debug!(
                        "[{}] {} skipped: {} of {} samples",
                        target.name,
                        condition,
                        samples,
                        required
                    );
                }
                _ => {}
            }
        }

        events
    }
}

fn log_check(target: &Target, outcome: &Outcome, stats: &WindowedStats) {
    let status = outcome
        .status_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    match &outcome.error {
        Some(error) => tracing::error!(
            "[{}] check failed: {} - Response Time: {:.3}s, Avg Response Time: {:.3}s, Success Rate: {:.1}%, Availability: {:.1}%",
            target.name,
            error,
            outcome.elapsed.as_secs_f64(),
            stats.avg_latency.as_secs_f64(),
            stats.success_rate,
            stats.availability
        ),
        None => tracing::info!(
            "[{}] check completed - Status: {}, Response Time: {:.3}s, Avg Response Time: {:.3}s, Success Rate: {:.1}%, Availability: {:.1}%",
            target.name,
            status,
            outcome.elapsed.as_secs_f64(),
            stats.avg_latency.as_secs_f64(),
            stats.success_rate,
            stats.availability
        ),
    }
}

/// Point-in-time view of one target's state.
#[derive(Debug, Clone)]
pub struct TargetSnapshot {
    pub stats: WindowedStats,
    pub conditions: Vec<ConditionState>,
}

/// Shared engine holding one lock per target.
///
/// The outer map is only write-locked to register a target on its first
/// outcome; evaluation holds the target's own mutex, so targets never block
/// each other.
#[derive(Debug, Default)]
pub struct AlertEngine {
    monitors: RwLock<HashMap<String, Arc<Mutex<TargetMonitor>>>>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one outcome. Outcomes for a target must arrive in probe order.
    pub fn ingest(&self, target: &Target, outcome: Outcome) -> Vec<Event> {
        let monitor = self.monitor(target);
        let mut monitor = monitor.lock().unwrap_or_else(PoisonError::into_inner);
        monitor.ingest(target, outcome)
    }

    pub fn snapshot(&self, name: &str) -> Option<TargetSnapshot> {
        let monitor = {
            let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
            monitors.get(name)?.clone()
        };
        let monitor = monitor.lock().unwrap_or_else(PoisonError::into_inner);

        Some(TargetSnapshot {
            stats: monitor.stats(),
            conditions: monitor.tracker().states().to_vec(),
        })
    }

    fn monitor(&self, target: &Target) -> Arc<Mutex<TargetMonitor>> {
        {
            let monitors = self.monitors.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(monitor) = monitors.get(&target.name) {
                return monitor.clone();
            }
        }

        let mut monitors = self.monitors.write().unwrap_or_else(PoisonError::into_inner);
        monitors
            .entry(target.name.clone())
            .or_insert_with(|| {
                tracing::debug!("Creating monitor state for {}", target.name);
                Arc::new(Mutex::new(TargetMonitor::new(target.window_size)))
            })
            .clone()
    }
}
