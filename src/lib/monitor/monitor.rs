use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::types::{MonitorHandle, MonitorLoop, MonitorRecord};
use crate::lib::engine::types::{EngineError, EngineResult, ProgressEvent};
use crate::lib::registry::types::ContainerRegistry;
use crate::lib::relay::types::EventKind;

impl MonitorLoop {
    pub fn new(registry: ContainerRegistry, interval: Duration) -> Self {
        MonitorLoop { registry, interval }
    }

    /// Publishes one snapshot and returns how many containers it held.
    pub async fn tick(&self) -> EngineResult<usize> {
        let containers = self.registry.list_all(None, true).await?;
        let snapshot: Vec<MonitorRecord> = containers.iter().map(MonitorRecord::from).collect();

        let data = serde_json::to_value(&snapshot)
            .map_err(|e| EngineError::OperationFailed(format!("snapshot encoding: {e}")))?;
        let mut objects = BTreeMap::new();
        objects.insert("data".to_string(), data);

        self.registry
            .relay()
            .publish(EventKind::Monitor, ProgressEvent::Aux(objects));
        Ok(snapshot.len())
    }

    pub fn start(self) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));

        MonitorHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }

    async fn run(self, shutdown_rx: oneshot::Receiver<()>) {
        info!(interval_ms = self.interval.as_millis() as u64, "monitor loop started");

        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown_rx);
        let mut failing = false;

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match self.tick().await {
                        Ok(count) => {
                            if failing {
                                info!("monitor tick recovered");
                                failing = false;
                            }
                            debug!(containers = count, "monitor snapshot published");
                        }
                        Err(e) => {
                            warn!(error = %e, "monitor tick failed");
                            // Only the first failure of a streak reaches clients.
                            if !failing {
                                self.registry
                                    .relay()
                                    .status(format!("Monitor error: {e}"));
                                failing = true;
                            }
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("monitor loop stopped");
                    break;
                }
            }
        }
    }
}

impl MonitorHandle {
    /// Signals the loop and waits for the in-flight tick, if any, to end.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            warn!(error = %e, "monitor task ended abnormally");
        }
    }
}
