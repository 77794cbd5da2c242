/// Background trigger supervisor
///
/// Keeps one polling loop per configured trigger node. Loops are started,
/// restarted and stopped by reconciling against the workflow store whenever
/// the graph changes:
/// - a trigger becomes configured: start a fresh cursor
/// - its configuration changes: stop the old cursor, start a fresh one
/// - it is removed or unconfigured, or there is no ledger: stop it

use crate::chain::{Ledger, LogDecoder};
use crate::runtime::cursor::EventCursor;
use crate::runtime::engine::ExecutionEngine;
use crate::workflow::store::WorkflowStore;
use crate::workflow::types::{NodeConfig, TriggerConfig};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{broadcast::error::RecvError, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A running cursor loop
struct Watcher {
    config: TriggerConfig,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct TriggerSupervisor {
    store: Arc<WorkflowStore>,
    engine: Arc<ExecutionEngine>,
    /// Watch capability; without it no cursor runs
    ledger: Option<Arc<dyn Ledger>>,
    decoder: Arc<dyn LogDecoder>,
    poll_interval: Duration,
    /// Key: trigger node id
    watchers: RwLock<HashMap<String, Watcher>>,
}

impl TriggerSupervisor {
    pub fn new(
        store: Arc<WorkflowStore>,
        engine: Arc<ExecutionEngine>,
        ledger: Option<Arc<dyn Ledger>>,
        decoder: Arc<dyn LogDecoder>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            ledger,
            decoder,
            poll_interval,
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// Sync once, then resync on every graph change until `shutdown` fires
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!("⏰ Starting trigger supervisor");
        let mut changes = self.store.subscribe_changes();
        self.sync().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(change) => tracing::debug!("📬 Graph change: {:?}", change),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!("📬 Missed {} graph change(s); resyncing", missed);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
            self.sync().await;
        }

        self.stop_all().await;
        tracing::info!("✅ Trigger supervisor stopped");
    }

    /// Reconcile running cursors with the configured trigger nodes
    pub async fn sync(&self) {
        let desired: HashMap<String, TriggerConfig> = match &self.ledger {
            Some(_) => self
                .store
                .snapshot()
                .nodes
                .iter()
                .filter_map(|node| match &node.config {
                    NodeConfig::Trigger(config) if config.is_configured() => {
                        Some((node.id.clone(), config.clone()))
                    }
                    _ => None,
                })
                .collect(),
            None => HashMap::new(),
        };

        let mut watchers = self.watchers.write().await;

        let stale: Vec<String> = watchers
            .iter()
            .filter(|(id, watcher)| desired.get(*id) != Some(&watcher.config) || watcher.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for node_id in stale {
            if let Some(watcher) = watchers.remove(&node_id) {
                watcher.cancel.cancel();
                tracing::info!("🛑 Stopped cursor for trigger '{}'", node_id);
            }
        }

        let Some(ledger) = &self.ledger else {
            return;
        };
        for (node_id, config) in desired {
            if watchers.contains_key(&node_id) {
                continue;
            }
            let Some(cursor) = EventCursor::new(node_id.clone(), &config) else {
                continue;
            };

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(poll_loop(
                cursor,
                Arc::clone(ledger),
                Arc::clone(&self.decoder),
                Arc::clone(&self.engine),
                self.poll_interval,
                cancel.clone(),
            ));
            tracing::info!("🔥 Started cursor for trigger '{}'", node_id);
            watchers.insert(node_id, Watcher { config, cancel, handle });
        }
    }

    /// Trigger node ids with a running cursor
    pub async fn active_triggers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .watchers
            .read()
            .await
            .iter()
            .filter(|(_, watcher)| !watcher.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stop every cursor loop and wait for them to exit
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Watcher)> = self.watchers.write().await.drain().collect();
        for (node_id, watcher) in drained {
            watcher.cancel.cancel();
            if let Err(e) = watcher.handle.await {
                tracing::warn!("⚠️ Cursor task for '{}' ended abnormally: {}", node_id, e);
            }
        }
    }
}

/// Tick immediately, then every `interval`, until cancelled
///
/// Each payload starts its own run so a slow workflow never delays polling.
async fn poll_loop(
    mut cursor: EventCursor,
    ledger: Arc<dyn Ledger>,
    decoder: Arc<dyn LogDecoder>,
    engine: Arc<ExecutionEngine>,
    interval: Duration,
    cancel: CancellationToken,
) {
    // interval() panics on a zero period
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = cursor.tick(ledger.as_ref(), decoder.as_ref()) => result,
        };

        match result {
            Ok(payloads) => {
                for payload in payloads {
                    let engine = Arc::clone(&engine);
                    let node_id = cursor.node_id().to_string();
                    tokio::spawn(async move {
                        engine.execute_workflow(&node_id, payload).await;
                    });
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Poll for trigger '{}' failed: {}", cursor.node_id(), e);
            }
        }
    }

    tracing::debug!("🧹 Cursor loop for '{}' exited", cursor.node_id());
}
