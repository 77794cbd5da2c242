/// Event cursor for one trigger node
///
/// Tracks how far the ledger has been scanned and which logs were already
/// seen. Each `tick` returns the payloads that should start new runs.
///
/// The watermark starts at `height - 1` on the first tick, so events emitted
/// before the cursor was activated are never picked up. There is no backfill
/// and nothing survives a restart or reconfiguration.

use crate::chain::{EventKind, Ledger, LogDecoder, LogFilter, LogId};
use crate::error::LedgerError;
use crate::workflow::types::TriggerConfig;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug)]
pub struct EventCursor {
    node_id: String,
    filter: LogFilter,
    /// Lower-cased sender whose logs are ignored
    exclude_sender: Option<String>,
    /// Highest height already scanned; never decreases
    last_polled_block: Option<u64>,
    /// Every log id seen since activation
    processed: HashSet<LogId>,
}

impl EventCursor {
    /// Build a cursor for a trigger, or `None` if it is not fully configured
    pub fn new(node_id: impl Into<String>, config: &TriggerConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let address = config.contract_address.clone()?;
        let event = config.event()?;

        Some(Self {
            node_id: node_id.into(),
            filter: LogFilter { address, event },
            exclude_sender: config
                .exclude_sender
                .as_deref()
                .map(str::trim)
                .filter(|sender| !sender.is_empty())
                .map(str::to_lowercase),
            last_polled_block: None,
            processed: HashSet::new(),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn event(&self) -> EventKind {
        self.filter.event
    }

    pub fn watermark(&self) -> Option<u64> {
        self.last_polled_block
    }

    pub fn has_processed(&self, id: &LogId) -> bool {
        self.processed.contains(id)
    }

    /// Scan new blocks once
    ///
    /// Ledger errors leave the watermark where it was. Decode failures only
    /// skip the offending log; the range still counts as scanned.
    pub async fn tick(&mut self, ledger: &dyn Ledger, decoder: &dyn LogDecoder) -> Result<Vec<Value>, LedgerError> {
        let height = ledger.current_height().await?;
        let last = *self.last_polled_block.get_or_insert_with(|| {
            tracing::info!(
                "📍 Cursor for '{}' activated at height {} ({} on {})",
                self.node_id,
                height,
                self.filter.event,
                self.filter.address
            );
            height.saturating_sub(1)
        });

        let Some(from) = last.checked_add(1).filter(|from| *from <= height) else {
            tracing::trace!("💤 No new blocks for '{}' (height {})", self.node_id, height);
            return Ok(Vec::new());
        };

        let logs = ledger.query_logs(&self.filter, from, height).await?;
        tracing::debug!("🔎 '{}' scanned blocks [{}, {}]: {} log(s)", self.node_id, from, height, logs.len());

        let mut payloads = Vec::new();
        for log in &logs {
            let id = log.id();
            if !self.processed.insert(id) {
                tracing::debug!("⏭️ Log {} already processed", id);
                continue;
            }

            match decoder.decode(self.filter.event, log) {
                Ok(payload) if self.is_excluded(&payload) => {
                    tracing::info!("🔁 Log {} sent by excluded sender; not triggering '{}'", id, self.node_id);
                }
                Ok(payload) => payloads.push(payload),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to decode log {} for '{}': {}", id, self.node_id, e);
                }
            }
        }

        self.last_polled_block = Some(height);
        Ok(payloads)
    }

    fn is_excluded(&self, payload: &Value) -> bool {
        let Some(excluded) = &self.exclude_sender else {
            return false;
        };
        payload
            .get(self.filter.event.sender_field())
            .and_then(Value::as_str)
            .is_some_and(|sender| sender.to_lowercase() == *excluded)
    }
}
