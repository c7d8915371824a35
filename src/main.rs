//! apiwatch - HTTP endpoint monitoring with alerting
//!
//! Probes configured endpoints on a fixed interval, tracks windowed statistics
//! per target and sends alert and recovery notifications.

mod config;
mod engine;
mod notify;
mod probe;
mod scheduler;

use config::MonitorConfig;
use engine::{AlertEngine, Phase};
use notify::{run_dispatcher, Dispatcher};
use probe::HttpProber;
use scheduler::Scheduler;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("apiwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load()?;
    let interval = cfg.check_interval()?;
    let targets = cfg.targets();
    if targets.is_empty() {
        return Err("no valid targets configured".into());
    }

    tracing::info!(
        "Starting apiwatch: {} targets, check interval {:?}",
        targets.len(),
        interval
    );
    for target in &targets {
        tracing::info!(
            "Monitoring {} ({} {}), window {}, alert after {} checks, cooldown {:?}",
            target.name,
            target.method,
            target.url,
            target.window_size,
            target.consecutive_threshold,
            target.cooldown
        );
    }

    // Notification channels
    let dispatcher = Dispatcher::from_config(&cfg.notifiers)?;
    if dispatcher.is_empty() {
        tracing::warn!("No notifiers configured; alerts will only be logged");
    }
    let (event_tx, event_rx) = mpsc::channel(1000);
    let dispatcher_handle = tokio::spawn(run_dispatcher(event_rx, dispatcher));

    // Start checking
    let engine = Arc::new(AlertEngine::new());
    let prober = Arc::new(HttpProber::new()?);
    let scheduler = Scheduler::new(engine.clone(), prober, interval, event_tx);
    scheduler.start(targets.clone()).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    scheduler.stop().await;
    drop(scheduler);

    // Loops exit after their current check; the dispatcher finishes once
    // every sender is gone.
    if dispatcher_handle.await.is_err() {
        tracing::error!("Dispatcher task panicked");
    }

    for target in &targets {
        let Some(snapshot) = engine.snapshot(&target.name) else {
            continue;
        };
        let alerting: Vec<_> = snapshot
            .conditions
            .iter()
            .filter(|state| state.phase() == Phase::Alerting)
            .map(|state| state.condition.as_str())
            .collect();

        tracing::info!(
            "{}: {} requests, success rate {:.1}%, availability {:.1}%, alerting: {:?}",
            target.name,
            snapshot.stats.request_count,
            snapshot.stats.success_rate,
            snapshot.stats.availability,
            alerting
        );
        for state in &snapshot.conditions {
            if let Some(sent) = state.last_alert_time() {
                tracing::info!(
                    "{}: last {} alert at {}, last recovery at {}",
                    target.name,
                    state.condition,
                    sent.format("%Y-%m-%d %H:%M:%S"),
                    state
                        .last_recovery_time()
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
            }
        }
    }

    Ok(())
}
