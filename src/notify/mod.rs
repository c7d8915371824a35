//! Notification delivery for alert and recovery events.
//!
//! The engine decides what to send; this module only formats and delivers.
//! Failed deliveries are logged and never retried.

mod email;
mod feishu;
mod webhook;

pub use email::*;
pub use feishu::*;
pub use webhook::*;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::NotifierConfig;
use crate::engine::Event;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{channel} rejected notification with status {status}: {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
    #[error("email error: {0}")]
    Email(String),
}

/// A channel that can deliver events.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Label/value pairs describing an event, shared by the text-based channels.
pub fn summary_fields(event: &Event) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("Time", event.timestamp().format("%Y-%m-%d %H:%M:%S").to_string()),
        ("Service", event.target_name().to_string()),
        ("URL", event.target_url().to_string()),
        ("Alert Type", event.kind().to_uppercase()),
        ("Condition", event.condition().label().to_string()),
    ];

    if let Event::Alert(alert) = event {
        fields.push((
            "Status Code",
            alert
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        ));
        fields.push(("Response Time", format!("{:.3}s", alert.elapsed.as_secs_f64())));
    }

    let stats = event.stats();
    if !stats.is_empty() {
        fields.push((
            "Average Response Time",
            format!("{:.3}s", stats.avg_latency.as_secs_f64()),
        ));
        fields.push(("Success Rate", format!("{:.1}%", stats.success_rate)));
        fields.push(("Availability", format!("{:.1}%", stats.availability)));
        fields.push(("Total Requests", stats.request_count.to_string()));
        fields.push((
            "Window",
            format!(
                "last {} requests over {:.1} minutes",
                stats.request_count,
                stats.span.as_secs_f64() / 60.0
            ),
        ));
    }

    fields.push(("Details", event.message().to_string()));
    fields
}

/// Fans events out to every configured channel.
pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_config(configs: &[NotifierConfig]) -> Result<Self, NotifyError> {
        let client = reqwest::Client::new();
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::with_capacity(configs.len());

        for config in configs {
            match config {
                NotifierConfig::Feishu { webhook, user_ids } => {
                    notifiers.push(Box::new(FeishuNotifier::new(
                        client.clone(),
                        webhook.clone(),
                        user_ids.clone(),
                    )));
                }
                NotifierConfig::Webhook { url, headers } => {
                    notifiers.push(Box::new(WebhookNotifier::new(
                        client.clone(),
                        url.clone(),
                        headers.clone(),
                    )));
                }
                NotifierConfig::Email {
                    smtp_host,
                    smtp_port,
                    username,
                    password,
                    from,
                    to,
                    use_tls,
                } => {
                    let credentials = username.clone().zip(password.clone());
                    notifiers.push(Box::new(EmailNotifier::new(
                        smtp_host,
                        *smtp_port,
                        credentials,
                        from,
                        to,
                        *use_tls,
                    )?));
                }
            }
        }

        Ok(Self::new(notifiers))
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver one event to every channel. Returns how many succeeded.
    pub async fn dispatch(&self, event: &Event) -> usize {
        let mut delivered = 0;

        for notifier in &self.notifiers {
            match notifier.notify(event).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::info!(
                        "Sent {} notification for {} ({}) via {}",
                        event.kind(),
                        event.target_name(),
                        event.condition(),
                        notifier.name()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to send {} notification for {} via {}: {}",
                        event.kind(),
                        event.target_name(),
                        notifier.name(),
                        e
                    );
                }
            }
        }

        delivered
    }
}

/// Deliver events from the scheduler until the channel closes.
pub async fn run_dispatcher(mut rx: mpsc::Receiver<Event>, dispatcher: Dispatcher) {
    while let Some(event) = rx.recv().await {
        if dispatcher.is_empty() {
            tracing::warn!(
                "No notifiers configured; dropping {} event for {}: {}",
                event.kind(),
                event.target_name(),
                event.message()
            );
            continue;
        }
        dispatcher.dispatch(&event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AlertEvent, ConditionId, RecoveryEvent, Severity, WindowedStats};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    pub(crate) fn sample_alert() -> Event {
        Event::Alert(AlertEvent {
            target_name: "prod".to_string(),
            target_url: "https://api.example.com/health".to_string(),
            condition: ConditionId::StatusCode,
            severity: Severity::Error,
            message: "API returned non-200 status code 503 for 3 consecutive checks".to_string(),
            status_code: Some(503),
            elapsed: Duration::from_millis(1250),
            stats: WindowedStats {
                request_count: 10,
                success_count: 7,
                available_count: 10,
                avg_latency: Duration::from_millis(400),
                success_rate: 70.0,
                availability: 100.0,
                span: Duration::from_secs(270),
                ..Default::default()
            },
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        })
    }

    pub(crate) fn sample_recovery() -> Event {
        Event::Recovery(RecoveryEvent {
            target_name: "prod".to_string(),
            target_url: "https://api.example.com/health".to_string(),
            condition: ConditionId::Latency,
            message: "Response time has returned to normal: 0.200s".to_string(),
            stats: WindowedStats::default(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 45, 0).unwrap(),
        })
    }

    struct CountingNotifier {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn notify(&self, _event: &Event) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Email("mailbox unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_summary_fields_for_alert() {
        let fields = summary_fields(&sample_alert());
        let get = |label: &str| {
            fields
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("Time").as_deref(), Some("2024-03-01 12:30:00"));
        assert_eq!(get("Alert Type").as_deref(), Some("ERROR"));
        assert_eq!(get("Status Code").as_deref(), Some("503"));
        assert_eq!(get("Response Time").as_deref(), Some("1.250s"));
        assert_eq!(get("Success Rate").as_deref(), Some("70.0%"));
        assert_eq!(get("Total Requests").as_deref(), Some("10"));
        assert_eq!(get("Window").as_deref(), Some("last 10 requests over 4.5 minutes"));
        assert_eq!(fields.last().map(|(l, _)| *l), Some("Details"));
    }

    #[test]
    fn test_summary_fields_for_recovery() {
        let fields = summary_fields(&sample_recovery());
        assert!(fields.iter().any(|(l, v)| *l == "Alert Type" && v == "RECOVERY"));
        assert!(!fields.iter().any(|(l, _)| *l == "Status Code"));
        // Empty stats are left out rather than shown as zeros.
        assert!(!fields.iter().any(|(l, _)| *l == "Success Rate"));
        assert!(!fields.iter().any(|(l, _)| *l == "Window"));
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_failure() {
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let ok_calls = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            Box::new(CountingNotifier {
                calls: failing_calls.clone(),
                fail: true,
            }),
            Box::new(CountingNotifier {
                calls: ok_calls.clone(),
                fail: false,
            }),
        ]);

        let delivered = dispatcher.dispatch(&sample_alert()).await;
        assert_eq!(delivered, 1);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_dispatcher_drains_channel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![Box::new(CountingNotifier {
            calls: calls.clone(),
            fail: false,
        })]);

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_dispatcher(rx, dispatcher));

        tx.send(sample_alert()).await.unwrap();
        tx.send(sample_recovery()).await.unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_builds_channels() {
        let dispatcher = Dispatcher::from_config(&[
            NotifierConfig::Feishu {
                webhook: "https://open.feishu.cn/hook/abc".to_string(),
                user_ids: vec![],
            },
            NotifierConfig::Webhook {
                url: "https://hooks.example.com".to_string(),
                headers: Default::default(),
            },
        ])
        .unwrap();

        assert!(!dispatcher.is_empty());
        assert!(Dispatcher::from_config(&[]).unwrap().is_empty());
    }
}
