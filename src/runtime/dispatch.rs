/// Action dispatchers for Decision, Transfer and Mint nodes
///
/// Each dispatcher turns a node's typed configuration plus the incoming payload
/// into exactly one external call and interprets the reply:
/// - Decision: inference service, returns `{result, original}`
/// - Transfer: relay `transfer`, passes the payload through
/// - Mint: relay `mint`, passes the payload through
///
/// There are no retries. Any error becomes the node's `Fail` status upstream.

use crate::error::DispatchError;
use crate::runtime::services::{
    InferenceRequest, InferenceService, RelayAction, RelayParams, RelayRequest, RelayService,
};
use crate::workflow::types::{DecisionConfig, MintConfig, NodeConfig, TransferConfig};
use serde_json::{json, Value};
use std::sync::Arc;

const INFERENCE: &str = "inference service";
const RELAY: &str = "relay service";

/// Routes a node to the adapter for its kind
pub struct ActionDispatcher {
    inference: Arc<dyn InferenceService>,
    relay: Arc<dyn RelayService>,
    /// Token in recipient fields replaced by `payload.to`
    recipient_placeholder: String,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("recipient_placeholder", &self.recipient_placeholder)
            .finish_non_exhaustive()
    }
}

impl ActionDispatcher {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        relay: Arc<dyn RelayService>,
        recipient_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            inference,
            relay,
            recipient_placeholder: recipient_placeholder.into(),
        }
    }

    /// Run the external side effect for one node
    ///
    /// Returns the payload handed to the node's successors.
    pub async fn dispatch(&self, node_id: &str, config: &NodeConfig, input: &Value) -> Result<Value, DispatchError> {
        tracing::info!("🚀 Dispatching node '{}' ({})", node_id, config.kind());
        let start_time = std::time::Instant::now();

        let result = match config {
            NodeConfig::Trigger(_) => Err(DispatchError::NotDispatchable { kind: config.kind() }),
            NodeConfig::Decision(decision) => self.decide(decision, input).await,
            NodeConfig::Transfer(transfer) => self.transfer(transfer, input).await,
            NodeConfig::Mint(mint) => self.mint(mint, input).await,
        };

        let duration = start_time.elapsed();
        match &result {
            Ok(_) => tracing::info!("✅ Node '{}' dispatched in {:?}", node_id, duration),
            Err(e) => tracing::error!("❌ Node '{}' failed in {:?} - Error: {}", node_id, duration, e),
        }
        result
    }

    async fn decide(&self, config: &DecisionConfig, input: &Value) -> Result<Value, DispatchError> {
        let prompt = config
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(DispatchError::MissingConfig {
                kind: "ai-decision",
                field: "prompt",
            })?;

        let request = InferenceRequest {
            prompt: prompt.to_string(),
            data: input.clone(),
        };
        let response = self
            .inference
            .decide(&request)
            .await
            .map_err(|source| DispatchError::Service {
                service: INFERENCE,
                source,
            })?;

        if !response.success {
            return Err(DispatchError::Rejected {
                service: INFERENCE,
                message: response.error.unwrap_or_else(|| "AI decision failed".to_string()),
            });
        }
        let result = response.result.ok_or(DispatchError::IncompleteResponse {
            service: INFERENCE,
            field: "result",
        })?;

        tracing::debug!("🤖 Decision result: {}", result);
        Ok(json!({
            "result": result.to_lowercase(),
            "original": input,
        }))
    }

    async fn transfer(&self, config: &TransferConfig, input: &Value) -> Result<Value, DispatchError> {
        let amount = config
            .amount
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(DispatchError::MissingConfig {
                kind: "send-usdt",
                field: "amount",
            })?;
        let to = self.resolve_recipient("send-usdt", config.recipient.as_deref(), input)?;

        self.relay(RelayRequest {
            action: RelayAction::Transfer,
            params: RelayParams {
                to,
                amount: Some(amount.to_string()),
            },
        })
        .await?;
        Ok(input.clone())
    }

    async fn mint(&self, config: &MintConfig, input: &Value) -> Result<Value, DispatchError> {
        let to = self.resolve_recipient("mint-nft", config.recipient.as_deref(), input)?;

        self.relay(RelayRequest {
            action: RelayAction::Mint,
            params: RelayParams { to, amount: None },
        })
        .await?;
        Ok(input.clone())
    }

    async fn relay(&self, request: RelayRequest) -> Result<(), DispatchError> {
        tracing::debug!("📡 Relay {:?} to {}", request.action, request.params.to);
        let response = self
            .relay
            .submit(&request)
            .await
            .map_err(|source| DispatchError::Service { service: RELAY, source })?;

        if !response.success {
            return Err(DispatchError::Rejected {
                service: RELAY,
                message: response.error.unwrap_or_else(|| format!("{:?} failed", request.action)),
            });
        }
        Ok(())
    }

    /// Substitute the placeholder with `payload.to`
    ///
    /// Fails when the field is empty, or still holds the placeholder because
    /// the payload has no `to`.
    fn resolve_recipient(&self, kind: &'static str, raw: Option<&str>, input: &Value) -> Result<String, DispatchError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        let placeholder = self.recipient_placeholder.as_str();

        let resolved = match input.get("to").and_then(Value::as_str) {
            Some(to) if !placeholder.is_empty() && raw.contains(placeholder) => raw.replace(placeholder, to),
            _ => raw.to_string(),
        };

        if resolved.is_empty() || (!placeholder.is_empty() && resolved.contains(placeholder)) {
            return Err(DispatchError::UnresolvedRecipient {
                kind,
                raw: raw.to_string(),
            });
        }
        Ok(resolved)
    }
}
