//! Per-condition alert state machine with cooldown-gated notifications.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::condition::Evaluation;
use super::models::{ConditionId, Target};

/// Thresholds that drive the state machine for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub consecutive_threshold: u32,
    pub cooldown: Duration,
}

impl From<&Target> for AlertPolicy {
    fn from(target: &Target) -> Self {
        Self {
            consecutive_threshold: target.consecutive_threshold,
            cooldown: target.cooldown,
        }
    }
}

/// Last time a notification of one kind was allowed through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cooldown {
    last_sent: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.last_sent
    }

    /// A key that never fired always passes.
    pub fn permits(&self, now: DateTime<Utc>, period: Duration) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map(|elapsed| elapsed >= period)
                .unwrap_or(false),
        }
    }

    /// Record the send immediately when permitted, before delivery is attempted.
    pub fn try_acquire(&mut self, now: DateTime<Utc>, period: Duration) -> bool {
        if self.permits(now, period) {
            self.last_sent = Some(now);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Normal,
    /// Abnormal, but fewer than the threshold consecutive checks so far.
    Degrading,
    Alerting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionState {
    pub condition: ConditionId,
    pub consecutive_count: u32,
    pub alert_active: bool,
    pub alert_cooldown: Cooldown,
    pub recovery_cooldown: Cooldown,
}

impl ConditionState {
    pub fn new(condition: ConditionId) -> Self {
        Self {
            condition,
            consecutive_count: 0,
            alert_active: false,
            alert_cooldown: Cooldown::default(),
            recovery_cooldown: Cooldown::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.alert_active {
            Phase::Alerting
        } else if self.consecutive_count > 0 {
            Phase::Degrading
        } else {
            Phase::Normal
        }
    }

    pub fn last_alert_time(&self) -> Option<DateTime<Utc>> {
        self.alert_cooldown.last_sent()
    }

    pub fn last_recovery_time(&self) -> Option<DateTime<Utc>> {
        self.recovery_cooldown.last_sent()
    }
}

/// What a single evaluation did to a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Normal and staying normal, or evaluation skipped.
    Unchanged,
    Degrading,
    /// Alert became active and the notification passed cooldown.
    Triggered,
    /// Alert still active and cooldown elapsed since the last notification.
    Reminder,
    /// Alert active but the notification is inside its cooldown.
    Suppressed,
    Recovered,
    /// Alert cleared but the recovery notification is inside its cooldown.
    RecoverySuppressed,
}

/// Alert state for every condition of one target.
#[derive(Debug, Clone)]
pub struct AlertStateTracker {
    states: [ConditionState; 4],
}

impl Default for AlertStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertStateTracker {
    pub fn new() -> Self {
        Self {
            states: ConditionId::ALL.map(ConditionState::new),
        }
    }

    pub fn state(&self, condition: ConditionId) -> &ConditionState {
        &self.states[condition.index()]
    }

    pub fn states(&self) -> &[ConditionState] {
        &self.states
    }

    /// Apply one evaluation. `now` is the outcome's timestamp.
    pub fn transition(
        &mut self,
        condition: ConditionId,
        evaluation: &Evaluation,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Transition {
        let state = &mut self.states[condition.index()];

        match evaluation {
            Evaluation::InsufficientData { .. } => Transition::Unchanged,
            Evaluation::Abnormal { .. } => {
                state.consecutive_count = state.consecutive_count.saturating_add(1);
                if state.consecutive_count < policy.consecutive_threshold {
                    return Transition::Degrading;
                }

                let newly_active = !state.alert_active;
                state.alert_active = true;

                if !state.alert_cooldown.try_acquire(now, policy.cooldown) {
                    Transition::Suppressed
                } else if newly_active {
                    Transition::Triggered
                } else {
                    Transition::Reminder
                }
            }
            Evaluation::Normal { .. } => {
                let was_active = state.alert_active;
                state.consecutive_count = 0;
                state.alert_active = false;

                if !was_active {
                    Transition::Unchanged
                } else if state.recovery_cooldown.try_acquire(now, policy.cooldown) {
                    Transition::Recovered
                } else {
                    Transition::RecoverySuppressed
                }
            }
        }
    }
}
