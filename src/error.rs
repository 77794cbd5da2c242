/// Error types for the automation runtime
///
/// Node-level failures (`DispatchError`) never escape a run: the engine turns
/// them into `Fail` status. The other enums surface to the editor API or to
/// the trigger polling loop, which logs them and carries on.

use thiserror::Error;

/// Errors from editing the workflow graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("duplicate edge id: {0}")]
    DuplicateEdge(String),

    #[error("edge {edge} references unknown node: {node}")]
    DanglingEdge { edge: String, node: String },

    #[error("node {node} is a {existing} node and cannot be reconfigured as {requested}")]
    KindMismatch {
        node: String,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("execution edges must not form a cycle (through node {0})")]
    CycleDetected(String),
}

/// Transport-level failures talking to the inference or relay service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response (status {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },
}

/// Why a node's dispatch failed
///
/// `MissingConfig` is raised before any external call is made; everything
/// else comes from the call itself. Both end the node in `Fail`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{kind} node missing {field} configuration")]
    MissingConfig {
        kind: &'static str,
        field: &'static str,
    },

    #[error("{kind} node could not resolve a recipient from '{raw}'")]
    UnresolvedRecipient { kind: &'static str, raw: String },

    #[error("{kind} nodes cannot be dispatched")]
    NotDispatchable { kind: &'static str },

    #[error("{service} call failed: {source}")]
    Service {
        service: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("{service} reported failure: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("{service} response missing {field}")]
    IncompleteResponse {
        service: &'static str,
        field: &'static str,
    },
}

/// Failures querying the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// Failures decoding a raw log into a payload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} topics, got {actual}")]
    TopicCount { expected: usize, actual: usize },

    #[error("topic0 {0} does not match the configured event")]
    SignatureMismatch(String),

    #[error("invalid hex word: {0}")]
    InvalidHex(String),

    #[error("log data too short: {0} bytes")]
    DataTooShort(usize),
}
