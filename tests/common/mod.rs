//! Shared fixtures for integration tests: recording service doubles, a
//! scripted ledger and small graph builders.

#![allow(dead_code)]

use async_trait::async_trait;
use automata::chain::{EventKind, Ledger, LogFilter, RawLog};
use automata::error::{LedgerError, ServiceError};
use automata::runtime::services::{
    InferenceRequest, InferenceResponse, InferenceService, RelayRequest, RelayResponse, RelayService,
};
use automata::runtime::{ActionDispatcher, ExecutionEngine};
use automata::workflow::types::{
    DecisionConfig, Edge, MintConfig, Node, NodeConfig, TransferConfig, TriggerConfig, Workflow,
};
use automata::workflow::WorkflowStore;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const PLACEHOLDER: &str = "{{Trigger.data.to}}";

// ============================================================================
// Inference service double
// ============================================================================

/// Answers with scripted results in order; repeats the last one when drained
#[derive(Default)]
pub struct MockInference {
    responses: Mutex<VecDeque<InferenceResponse>>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl MockInference {
    pub fn answering(results: &[&str]) -> Arc<Self> {
        let responses = results
            .iter()
            .map(|result| InferenceResponse {
                success: true,
                result: Some(result.to_string()),
                error: None,
            })
            .collect();
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([InferenceResponse {
                success: false,
                result: None,
                error: Some(message.to_string()),
            }])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl InferenceService for MockInference {
    async fn decide(&self, request: &InferenceRequest) -> Result<InferenceResponse, ServiceError> {
        self.requests.lock().push(request.clone());
        let mut responses = self.responses.lock();
        let response = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        response.ok_or_else(|| ServiceError::UnexpectedResponse {
            status: 503,
            body: "no scripted inference response".into(),
        })
    }
}

// ============================================================================
// Relay service double
// ============================================================================

/// Records every request; succeeds unless a failure was scripted
#[derive(Default)]
pub struct MockRelay {
    failures: Mutex<VecDeque<String>>,
    /// Per-recipient delay before answering
    latency: Mutex<HashMap<String, Duration>>,
    /// When set, each call waits for a permit after being recorded
    gate: Option<Semaphore>,
    pub requests: Mutex<Vec<RelayRequest>>,
}

impl MockRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Calls block until `release` lets them through
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn slow_down(&self, recipient: &str, delay: Duration) {
        self.latency.lock().insert(recipient.to_string(), delay);
    }

    /// The next `submit` reports `success: false` with this message
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    pub fn recorded(&self) -> Vec<RelayRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl RelayService for MockRelay {
    async fn submit(&self, request: &RelayRequest) -> Result<RelayResponse, ServiceError> {
        self.requests.lock().push(request.clone());

        let delay = self.latency.lock().get(&request.params.to).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        Ok(match self.failures.lock().pop_front() {
            Some(message) => RelayResponse {
                success: false,
                error: Some(message),
            },
            None => RelayResponse {
                success: true,
                error: None,
            },
        })
    }
}

// ============================================================================
// Ledger double
// ============================================================================

/// Scripted heights (last one repeats) and a fixed set of logs
#[derive(Default)]
pub struct MockLedger {
    pub heights: Mutex<VecDeque<u64>>,
    pub logs: Mutex<Vec<RawLog>>,
    /// Return every log regardless of the requested range
    pub ignore_range: bool,
    pub fail_heights: Mutex<bool>,
    pub fail_queries: Mutex<bool>,
    pub queries: Mutex<Vec<(u64, u64)>>,
    pub height_calls: Mutex<usize>,
}

impl MockLedger {
    pub fn with_heights(heights: &[u64]) -> Self {
        Self {
            heights: Mutex::new(heights.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().push(log);
    }

    pub fn queried(&self) -> Vec<(u64, u64)> {
        self.queries.lock().clone()
    }

    /// Number of `current_height` calls, failed ones included
    pub fn height_calls(&self) -> usize {
        *self.height_calls.lock()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_height(&self) -> Result<u64, LedgerError> {
        *self.height_calls.lock() += 1;
        if *self.fail_heights.lock() {
            return Err(unavailable("height unavailable"));
        }
        let mut heights = self.heights.lock();
        let height = if heights.len() > 1 {
            heights.pop_front()
        } else {
            heights.front().copied()
        };
        height.ok_or_else(|| unavailable("no scripted height"))
    }

    async fn query_logs(&self, _filter: &LogFilter, from_block: u64, to_block: u64) -> Result<Vec<RawLog>, LedgerError> {
        self.queries.lock().push((from_block, to_block));
        if *self.fail_queries.lock() {
            return Err(unavailable("logs unavailable"));
        }
        Ok(self
            .logs
            .lock()
            .iter()
            .filter(|log| self.ignore_range || (from_block..=to_block).contains(&log.block_number))
            .cloned()
            .collect())
    }
}

fn unavailable(message: &str) -> LedgerError {
    LedgerError::Rpc {
        code: -32000,
        message: message.to_string(),
    }
}

/// An encoded `Transfer(from, to, value)` log
pub fn transfer_log(block_number: u64, log_index: u64, from: &str, to: &str, value: u64) -> RawLog {
    RawLog {
        block_number,
        log_index,
        topics: vec![EventKind::Transfer.topic().to_string(), pad_address(from), pad_address(to)],
        data: format!("0x{value:064x}"),
    }
}

fn pad_address(address: &str) -> String {
    format!("0x{:0>64}", address.trim_start_matches("0x"))
}

// ============================================================================
// Graph builders
// ============================================================================

pub fn trigger(id: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Trigger(TriggerConfig {
            contract_address: Some(TOKEN.to_string()),
            event_name: Some("Transfer".to_string()),
            exclude_sender: None,
        }),
    )
}

pub fn decision(id: &str, prompt: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Decision(DecisionConfig {
            prompt: Some(prompt.to_string()),
        }),
    )
}

pub fn transfer(id: &str, recipient: &str, amount: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Transfer(TransferConfig {
            recipient: Some(recipient.to_string()),
            amount: Some(amount.to_string()),
        }),
    )
}

pub fn mint(id: &str, recipient: &str) -> Node {
    Node::new(
        id,
        NodeConfig::Mint(MintConfig {
            recipient: Some(recipient.to_string()),
        }),
    )
}

pub fn edge(source: &str, target: &str, handle: &str) -> Edge {
    Edge {
        id: format!("{source}-{handle}-{target}"),
        source: source.to_string(),
        target: target.to_string(),
        source_handle: Some(handle.to_string()),
        target_handle: None,
    }
}

pub fn store_with(nodes: Vec<Node>, edges: Vec<Edge>) -> Arc<WorkflowStore> {
    Arc::new(WorkflowStore::from_workflow(Workflow { nodes, edges }).unwrap())
}

pub fn dispatcher(inference: Arc<MockInference>, relay: Arc<MockRelay>) -> Arc<ActionDispatcher> {
    Arc::new(ActionDispatcher::new(inference, relay, PLACEHOLDER))
}

/// Engine over mocks; a zero delay settles statuses synchronously
pub fn engine(
    store: Arc<WorkflowStore>,
    inference: Arc<MockInference>,
    relay: Arc<MockRelay>,
    settle_delay: Duration,
) -> Arc<ExecutionEngine> {
    Arc::new(ExecutionEngine::new(store, dispatcher(inference, relay)).with_settle_delay(settle_delay))
}
