/// Workflow execution engine
///
/// Interprets the graph held by the `WorkflowStore`: starting from a node and
/// a payload it resolves which execution edges to follow, drives each target
/// through its status lifecycle and continues from every node that succeeds.
///
/// Traversal is depth-first and sequential within a run: a target and its
/// whole continuation finish before the next sibling edge is taken.

use crate::runtime::dispatch::ActionDispatcher;
use crate::workflow::store::{StatusTicket, WorkflowStore};
use crate::workflow::types::{Node, NodeConfig, NodeStatus};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Graph interpreter shared by trigger cursors and the test-run endpoint
#[derive(Debug)]
pub struct ExecutionEngine {
    store: Arc<WorkflowStore>,
    dispatcher: Arc<ActionDispatcher>,
    /// How long SuccessTransient/FailTransient are shown before settling
    settle_delay: Duration,
    /// Per-node run tokens; `None` lets overlapping runs race on status
    node_locks: Option<NodeLocks>,
}

/// What happened to one node during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { error: String },
    /// Reached a node that cannot be run (a trigger)
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStep {
    pub node_id: String,
    pub outcome: StepOutcome,
}

/// Record of a finished run, in execution order
///
/// A run always completes; node failures show up here and in node status,
/// never as an error to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub start_node_id: String,
    pub steps: Vec<RunStep>,
}

impl RunSummary {
    /// Node ids in the order they ran
    pub fn visited(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.node_id.as_str()).collect()
    }

    pub fn outcome(&self, node_id: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|step| step.node_id == node_id).map(|step| &step.outcome)
    }
}

/// Per-node mutexes so two runs never interleave on the same node
///
/// An entry lives only while some run holds or waits for it.
#[derive(Debug, Default)]
struct NodeLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NodeLocks {
    async fn acquire(&self, node_id: &str) -> NodeRunToken<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(node_id.to_string()).or_default())
        };
        NodeRunToken {
            locks: self,
            node_id: node_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Held for the duration of one node visit
struct NodeRunToken<'a> {
    locks: &'a NodeLocks,
    node_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NodeRunToken<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock();
        // waiters hold a clone until they own the guard
        if locks.get(&self.node_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.node_id);
        }
    }
}

impl ExecutionEngine {
    /// Create a new engine over the given store and dispatcher
    pub fn new(store: Arc<WorkflowStore>, dispatcher: Arc<ActionDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            settle_delay: Duration::from_millis(1500),
            node_locks: Some(NodeLocks::default()),
        }
    }

    /// Zero settles statuses synchronously
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_node_serialization(mut self, enabled: bool) -> Self {
        self.node_locks = enabled.then(NodeLocks::default);
        self
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.store
    }

    /// Execute the workflow downstream of `start_node_id`
    ///
    /// The start node itself is not run; it is the origin of `data` (a trigger
    /// that fired, or any node whose output is being replayed). Its outgoing
    /// edges are resolved with `data` as its output.
    pub async fn execute_workflow(&self, start_node_id: &str, data: Value) -> RunSummary {
        let run_id = Uuid::new_v4();
        let workflow_start_time = std::time::Instant::now();
        let mut summary = RunSummary {
            run_id,
            start_node_id: start_node_id.to_string(),
            steps: Vec::new(),
        };

        let Some(start) = self.store.node(start_node_id) else {
            tracing::warn!("⚠️ Run {} ignored: start node '{}' not found", run_id, start_node_id);
            return summary;
        };

        tracing::info!("🚀 Starting run {} from node '{}'", run_id, start_node_id);

        // Depth-first worklist; siblings are pushed in reverse so they pop in
        // edge-list order.
        let mut stack = self.resolve_branches(&start, data);
        stack.reverse();

        while let Some((node_id, input)) = stack.pop() {
            let Some(node) = self.store.node(&node_id) else {
                tracing::warn!("⚠️ Skipping node '{}' removed during run {}", node_id, run_id);
                continue;
            };

            let (outcome, output) = self.run_node(run_id, &node, input).await;
            summary.steps.push(RunStep {
                node_id: node.id.clone(),
                outcome,
            });

            if let Some(output) = output {
                let mut next = self.resolve_branches(&node, output);
                next.reverse();
                stack.extend(next);
            }
        }

        tracing::info!(
            "🎉 Run {} finished after {} node(s) in {:?}",
            run_id,
            summary.steps.len(),
            workflow_start_time.elapsed()
        );
        summary
    }

    /// Targets to run after `node` produced `output`, in edge-list order
    fn resolve_branches(&self, node: &Node, output: Value) -> Vec<(String, Value)> {
        let edges = self.store.outgoing_execution_edges(&node.id);
        if edges.is_empty() {
            tracing::debug!("🏁 Node '{}' has no outgoing execution edges", node.id);
            return Vec::new();
        }

        match &node.config {
            NodeConfig::Decision(_) => {
                let Some(result) = output.get("result").and_then(Value::as_str).map(str::to_lowercase) else {
                    tracing::warn!("⚠️ Decision node '{}' produced no result; run ends here", node.id);
                    return Vec::new();
                };

                let Some(edge) = edges
                    .iter()
                    .find(|edge| edge.source_handle.as_deref() == Some(result.as_str()))
                else {
                    tracing::info!("🔀 Decision node '{}' result '{}' matches no branch", node.id, result);
                    return Vec::new();
                };

                tracing::info!("🔀 Decision node '{}' took branch '{}' -> '{}'", node.id, result, edge.target);
                let original = output.get("original").cloned().unwrap_or(output);
                vec![(edge.target.clone(), original)]
            }
            NodeConfig::Trigger(_) | NodeConfig::Transfer(_) | NodeConfig::Mint(_) => edges
                .into_iter()
                .map(|edge| (edge.target, output.clone()))
                .collect(),
        }
    }

    /// Drive one node through Pending and its outcome
    ///
    /// Returns the step outcome and, on success, the payload to continue with.
    async fn run_node(&self, run_id: Uuid, node: &Node, input: Value) -> (StepOutcome, Option<Value>) {
        let _run_token = match &self.node_locks {
            Some(locks) => Some(locks.acquire(&node.id).await),
            None => None,
        };

        if let NodeConfig::Trigger(_) = node.config {
            tracing::warn!("⚠️ Trigger node '{}' cannot be run as a step", node.id);
            self.store.set_status(&node.id, run_id, NodeStatus::Idle);
            return (StepOutcome::Skipped, None);
        }

        self.store.set_status(&node.id, run_id, NodeStatus::Pending);

        match self.dispatcher.dispatch(&node.id, &node.config, &input).await {
            Ok(output) => {
                if let Some(ticket) = self.store.set_status(&node.id, run_id, NodeStatus::SuccessTransient) {
                    self.settle(run_id, &node.id, ticket, NodeStatus::Success);
                }
                (StepOutcome::Succeeded, Some(output))
            }
            Err(e) => {
                if let Some(ticket) = self.store.set_status(&node.id, run_id, NodeStatus::FailTransient) {
                    self.settle(run_id, &node.id, ticket, NodeStatus::Fail);
                }
                (StepOutcome::Failed { error: e.to_string() }, None)
            }
        }
    }

    /// Move a transient status to its terminal one after the settle delay
    ///
    /// Fire-and-forget: traversal never waits for it.
    fn settle(&self, run_id: Uuid, node_id: &str, ticket: StatusTicket, to: NodeStatus) {
        if self.settle_delay.is_zero() {
            self.store.settle_status(node_id, run_id, ticket, to);
            return;
        }

        let store = Arc::clone(&self.store);
        let node_id = node_id.to_string();
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !store.settle_status(&node_id, run_id, ticket, to) {
                tracing::debug!("⏭️ Settle of '{}' to {:?} skipped; node moved on", node_id, to);
            }
        });
    }
}
