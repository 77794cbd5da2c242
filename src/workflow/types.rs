/// Core workflow type definitions
///
/// Nodes, edges and the per-node status lifecycle. The JSON shapes follow what
/// the canvas editor sends: kebab-case node kinds, camelCase fields.

use crate::chain::{is_valid_address, EventKind};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Decision output port taken when the inference result is "true"
pub const HANDLE_TRUE: &str = "true";
/// Decision output port taken when the inference result is "false"
pub const HANDLE_FALSE: &str = "false";
/// Output port of triggers and actions
pub const HANDLE_ON_SUCCESS: &str = "on-success";

/// Source handles that carry control flow. Any other handle is a data link.
pub const EXECUTION_HANDLES: [&str; 3] = [HANDLE_TRUE, HANDLE_FALSE, HANDLE_ON_SUCCESS];

/// The whole graph edited on the canvas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A single node on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node identifier (e.g., "trigger-1")
    pub id: String,
    /// Kind plus its typed configuration
    pub config: NodeConfig,
    /// Lifecycle status, written only by the execution engine
    #[serde(default)]
    pub status: NodeStatus,
    /// Run that last wrote `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Store-assigned stamp of the last status write
    #[serde(skip)]
    pub(crate) status_ticket: u64,
}

impl Node {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            config,
            status: NodeStatus::Idle,
            run_id: None,
            status_ticket: 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.config.kind()
    }
}

/// Per-kind node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeConfig {
    /// On-chain event trigger
    #[serde(rename = "onchain-event")]
    Trigger(TriggerConfig),
    /// AI decision gate with "true"/"false" outputs
    #[serde(rename = "ai-decision")]
    Decision(DecisionConfig),
    /// Value transfer through the relay
    #[serde(rename = "send-usdt")]
    Transfer(TransferConfig),
    /// Asset mint through the relay
    #[serde(rename = "mint-nft")]
    Mint(MintConfig),
}

impl NodeConfig {
    /// Editor name of the node kind
    pub fn kind(&self) -> &'static str {
        match self {
            NodeConfig::Trigger(_) => "onchain-event",
            NodeConfig::Decision(_) => "ai-decision",
            NodeConfig::Transfer(_) => "send-usdt",
            NodeConfig::Mint(_) => "mint-nft",
        }
    }
}

/// Trigger configuration: which contract event to watch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    pub contract_address: Option<String>,
    pub event_name: Option<String>,
    /// Logs whose decoded sender equals this address are ignored, so the
    /// workflow does not re-fire on transfers it made itself.
    pub exclude_sender: Option<String>,
}

impl TriggerConfig {
    /// The event to watch, if the name is one the decoder knows
    pub fn event(&self) -> Option<EventKind> {
        self.event_name.as_deref().and_then(|name| name.parse().ok())
    }

    /// Valid address and known event name
    pub fn is_configured(&self) -> bool {
        self.contract_address.as_deref().is_some_and(is_valid_address) && self.event().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecisionConfig {
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConfig {
    /// Literal address or a placeholder such as `{{Trigger.data.to}}`
    pub recipient: Option<String>,
    /// Decimal amount, kept as text to avoid precision loss
    #[serde(deserialize_with = "deserialize_decimal")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MintConfig {
    pub recipient: Option<String>,
}

/// Accept `"10"` and `10` alike
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Decimal>::deserialize(deserializer)?.map(|value| match value {
        Decimal::Text(text) => text,
        Decimal::Number(number) => number.to_string(),
    }))
}

/// Node lifecycle within a run
///
/// `Idle -> Pending -> SuccessTransient -> Success`
/// `Idle -> Pending -> FailTransient -> Fail`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    #[serde(rename = "success_temp")]
    SuccessTransient,
    Success,
    #[serde(rename = "fail_temp")]
    FailTransient,
    Fail,
}

/// Connection between two node ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Edge {
    /// Whether the engine follows this edge
    pub fn is_execution(&self) -> bool {
        self.source_handle
            .as_deref()
            .is_some_and(|handle| EXECUTION_HANDLES.contains(&handle))
    }
}

/// A port-to-port connection request from the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>, handle: &str) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: Some(handle.to_string()),
            target_handle: None,
        }
    }
}
