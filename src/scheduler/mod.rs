//! Scheduler module for running periodic checks.
//!
//! Each target gets its own task with a fixed interval. Probes for one target
//! never overlap, so outcomes reach the engine in check order.

use crate::engine::{AlertEngine, Event, Target};
use crate::probe::Prober;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Orchestrates check loops for all targets.
pub struct Scheduler {
    engine: Arc<AlertEngine>,
    prober: Arc<dyn Prober>,
    interval: Duration,
    event_tx: mpsc::Sender<Event>,
    stop_chans: Arc<RwLock<HashMap<String, broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<AlertEngine>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            engine,
            prober,
            interval,
            event_tx,
            stop_chans: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start checking every target. The first check runs immediately.
    pub async fn start(&self, targets: Vec<Target>) {
        tracing::info!(
            "Starting scheduler with {} targets, check interval {:?}",
            targets.len(),
            self.interval
        );

        for target in targets {
            self.add_target(target).await;
        }
    }

    /// Add a target to be monitored.
    pub async fn add_target(&self, target: Target) {
        let mut stop_chans = self.stop_chans.write().await;

        if stop_chans.contains_key(&target.name) {
            return; // Already running
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        stop_chans.insert(target.name.clone(), stop_tx);
        drop(stop_chans);

        tracing::info!("Scheduler: Adding target {} ({})", target.name, target.url);

        let engine = self.engine.clone();
        let prober = self.prober.clone();
        let event_tx = self.event_tx.clone();
        let interval = self.interval;
        let stop_chans = self.stop_chans.clone();

        tokio::spawn(async move {
            let name = target.name.clone();
            run_check_loop(target, engine, prober, interval, event_tx, stop_rx).await;

            // Clean up when done
            let mut chans = stop_chans.write().await;
            chans.remove(&name);
        });
    }

    /// Signal every check loop to exit after its current check.
    pub async fn stop(&self) {
        let stop_chans = self.stop_chans.read().await;
        for (name, stop_tx) in stop_chans.iter() {
            let _ = stop_tx.send(());
            tracing::info!("Scheduler: Stopping target {}", name);
        }
    }
}

/// Run the check loop for a single target.
async fn run_check_loop(
    target: Target,
    engine: Arc<AlertEngine>,
    prober: Arc<dyn Prober>,
    interval: Duration,
    tx: mpsc::Sender<Event>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                tracing::debug!("Checking {} - {}", target.name, target.url);

                let outcome = prober.probe(&target).await;
                let events = engine.ingest(&target, outcome);

                for event in events {
                    if tx.send(event).await.is_err() {
                        tracing::error!("Failed to forward event for {}: dispatcher stopped", target.name);
                    }
                }
            }
        }
    }
}
