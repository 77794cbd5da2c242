/// Workflow graph store using ArcSwap
///
/// Holds the single in-memory workflow. Readers (the engine, trigger cursors,
/// the API) get lock-free snapshots; every edit clones the current graph,
/// applies one named operation and atomically swaps the pointer. Writers are
/// serialized so concurrent status updates from overlapping runs never lose
/// each other's writes.

use crate::error::StoreError;
use crate::workflow::types::{Connection, Edge, Node, NodeConfig, NodeStatus, Workflow};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// Structural change notifications for the trigger supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphChange {
    NodeAdded(String),
    NodeConfigured(String),
    NodeRemoved(String),
    EdgesChanged,
    Replaced,
}

/// One status write, in the order the store applied it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub run_id: Uuid,
    pub node_id: String,
    pub status: NodeStatus,
    pub at: DateTime<Utc>,
}

/// Identifies one status write
///
/// A delayed settle only applies while the node still holds the write it was
/// issued for, so a node reached twice in the same run cannot be settled by
/// the first visit's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTicket(u64);

/// Owned state container for the workflow graph
#[derive(Debug)]
pub struct WorkflowStore {
    /// Current graph, swapped atomically on every edit
    graph: ArcSwap<Workflow>,
    /// Serializes writers; readers never take it
    write_lock: Mutex<()>,
    changes: broadcast::Sender<GraphChange>,
    statuses: broadcast::Sender<StatusChange>,
    /// Source of `StatusTicket`s; 0 is never issued
    next_ticket: AtomicU64,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (statuses, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            graph: ArcSwap::new(Arc::new(Workflow::default())),
            write_lock: Mutex::new(()),
            changes,
            statuses,
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Create a store seeded with a validated workflow
    pub fn from_workflow(workflow: Workflow) -> Result<Self, StoreError> {
        let store = Self::new();
        store.replace(workflow)?;
        Ok(store)
    }

    /// Current graph (lock-free read)
    pub fn snapshot(&self) -> Arc<Workflow> {
        self.graph.load_full()
    }

    pub fn node(&self, node_id: &str) -> Option<Node> {
        self.graph.load().nodes.iter().find(|n| n.id == node_id).cloned()
    }

    pub fn status(&self, node_id: &str) -> Option<NodeStatus> {
        self.graph.load().nodes.iter().find(|n| n.id == node_id).map(|n| n.status)
    }

    /// Execution edges leaving a node, in edge-list order
    pub fn outgoing_execution_edges(&self, node_id: &str) -> Vec<Edge> {
        self.graph
            .load()
            .edges
            .iter()
            .filter(|edge| edge.source == node_id && edge.is_execution())
            .cloned()
            .collect()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<GraphChange> {
        self.changes.subscribe()
    }

    pub fn subscribe_statuses(&self) -> broadcast::Receiver<StatusChange> {
        self.statuses.subscribe()
    }

    /// Replace the whole graph after validating it
    ///
    /// Statuses are not taken from the caller: nodes already in the graph
    /// keep theirs, new nodes start `Idle`.
    pub fn replace(&self, mut workflow: Workflow) -> Result<(), StoreError> {
        for edge in &mut workflow.edges {
            normalize_handle(&mut edge.source_handle);
            normalize_handle(&mut edge.target_handle);
        }
        validate(&workflow)?;

        {
            let _guard = self.write_lock.lock();
            let current = self.graph.load();
            for node in &mut workflow.nodes {
                match current.nodes.iter().find(|n| n.id == node.id) {
                    Some(existing) => {
                        node.status = existing.status;
                        node.run_id = existing.run_id;
                        node.status_ticket = existing.status_ticket;
                    }
                    None => {
                        node.status = NodeStatus::Idle;
                        node.run_id = None;
                        node.status_ticket = 0;
                    }
                }
            }
            self.graph.store(Arc::new(workflow));
        }

        tracing::info!("📊 Workflow replaced");
        let _ = self.changes.send(GraphChange::Replaced);
        Ok(())
    }

    /// Add a node dropped onto the canvas
    pub fn add_node(&self, node: Node) -> Result<(), StoreError> {
        let node_id = node.id.clone();
        self.edit(|graph| {
            if graph.nodes.iter().any(|n| n.id == node.id) {
                return Err(StoreError::DuplicateNode(node.id.clone()));
            }
            graph.nodes.push(Node {
                status: NodeStatus::Idle,
                run_id: None,
                status_ticket: 0,
                ..node
            });
            Ok(())
        })?;

        tracing::debug!("➕ Added node '{}'", node_id);
        let _ = self.changes.send(GraphChange::NodeAdded(node_id));
        Ok(())
    }

    /// Replace a node's configuration; its kind cannot change
    pub fn update_config(&self, node_id: &str, config: NodeConfig) -> Result<(), StoreError> {
        self.edit(|graph| {
            let node = graph
                .nodes
                .iter_mut()
                .find(|n| n.id == node_id)
                .ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;

            if std::mem::discriminant(&node.config) != std::mem::discriminant(&config) {
                return Err(StoreError::KindMismatch {
                    node: node_id.to_string(),
                    existing: node.config.kind(),
                    requested: config.kind(),
                });
            }
            node.config = config;
            Ok(())
        })?;

        tracing::debug!("🔧 Reconfigured node '{}'", node_id);
        let _ = self.changes.send(GraphChange::NodeConfigured(node_id.to_string()));
        Ok(())
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&self, node_id: &str) -> Result<Node, StoreError> {
        let removed = self.edit(|graph| {
            let position = graph
                .nodes
                .iter()
                .position(|n| n.id == node_id)
                .ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;
            let removed = graph.nodes.remove(position);
            graph
                .edges
                .retain(|edge| edge.source != node_id && edge.target != node_id);
            Ok(removed)
        })?;

        tracing::debug!("🗑️ Removed node '{}'", node_id);
        let _ = self.changes.send(GraphChange::NodeRemoved(node_id.to_string()));
        Ok(removed)
    }

    /// Connect two ports
    ///
    /// An identical existing connection is returned instead of duplicated.
    /// Execution edges that would close a cycle are rejected.
    pub fn connect(&self, mut connection: Connection) -> Result<Edge, StoreError> {
        normalize_handle(&mut connection.source_handle);
        normalize_handle(&mut connection.target_handle);

        let edge = self.edit(|graph| {
            if let Some(existing) = graph.edges.iter().find(|edge| {
                edge.source == connection.source
                    && edge.target == connection.target
                    && edge.source_handle == connection.source_handle
                    && edge.target_handle == connection.target_handle
            }) {
                return Ok(existing.clone());
            }

            let edge = Edge {
                id: format!("edge-{}", Uuid::new_v4()),
                source: connection.source.clone(),
                target: connection.target.clone(),
                source_handle: connection.source_handle.clone(),
                target_handle: connection.target_handle.clone(),
            };
            graph.edges.push(edge.clone());
            validate(graph)?;
            Ok(edge)
        })?;

        tracing::debug!(
            "🔗 Connected '{}' -> '{}' ({})",
            edge.source,
            edge.target,
            edge.source_handle.as_deref().unwrap_or("data")
        );
        let _ = self.changes.send(GraphChange::EdgesChanged);
        Ok(edge)
    }

    pub fn disconnect(&self, edge_id: &str) -> Result<Edge, StoreError> {
        let removed = self.edit(|graph| {
            let position = graph
                .edges
                .iter()
                .position(|edge| edge.id == edge_id)
                .ok_or_else(|| StoreError::EdgeNotFound(edge_id.to_string()))?;
            Ok(graph.edges.remove(position))
        })?;

        let _ = self.changes.send(GraphChange::EdgesChanged);
        Ok(removed)
    }

    /// Record a status written by `run_id`
    ///
    /// Returns the ticket for this write, or `None` if the node is gone.
    pub fn set_status(&self, node_id: &str, run_id: Uuid, status: NodeStatus) -> Option<StatusTicket> {
        self.write_status(node_id, run_id, status, None)
    }

    /// Move a transient status to `to` only if the node still holds the write
    /// identified by `ticket`
    ///
    /// Used by the delayed settle step: a newer write (another run, or a later
    /// visit in the same run) must not be overwritten by an older timer.
    pub fn settle_status(&self, node_id: &str, run_id: Uuid, ticket: StatusTicket, to: NodeStatus) -> bool {
        self.write_status(node_id, run_id, to, Some(ticket)).is_some()
    }

    fn write_status(
        &self,
        node_id: &str,
        run_id: Uuid,
        status: NodeStatus,
        expected: Option<StatusTicket>,
    ) -> Option<StatusTicket> {
        let ticket = self
            .edit(|graph| {
                let Some(node) = graph.nodes.iter_mut().find(|n| n.id == node_id) else {
                    return Ok(None);
                };
                if let Some(StatusTicket(expected)) = expected {
                    if node.status_ticket != expected || node.run_id != Some(run_id) {
                        return Ok(None);
                    }
                }
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                node.status = status;
                node.run_id = Some(run_id);
                node.status_ticket = ticket;
                Ok(Some(StatusTicket(ticket)))
            })
            .unwrap_or(None);

        if ticket.is_some() {
            tracing::debug!("🚦 Node '{}' -> {:?} (run {})", node_id, status, run_id);
            let _ = self.statuses.send(StatusChange {
                run_id,
                node_id: node_id.to_string(),
                status,
                at: Utc::now(),
            });
        }
        ticket
    }

    /// Clone, modify, swap. The closure's error leaves the graph untouched.
    fn edit<T>(&self, apply: impl FnOnce(&mut Workflow) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock();
        let current = self.graph.load();
        let mut next = (**current).clone();
        let result = apply(&mut next)?;
        self.graph.store(Arc::new(next));
        Ok(result)
    }
}

fn normalize_handle(handle: &mut Option<String>) {
    if handle.as_deref().is_some_and(|h| h.trim().is_empty()) {
        *handle = None;
    }
}

/// Unique ids, known endpoints, acyclic execution edges
fn validate(workflow: &Workflow) -> Result<(), StoreError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut index = HashMap::new();

    for node in &workflow.nodes {
        if index.contains_key(node.id.as_str()) {
            return Err(StoreError::DuplicateNode(node.id.clone()));
        }
        index.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }

    let mut edge_ids = HashSet::new();
    for edge in &workflow.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            return Err(StoreError::DuplicateEdge(edge.id.clone()));
        }
        let endpoints = [edge.source.as_str(), edge.target.as_str()];
        for endpoint in endpoints {
            if !index.contains_key(endpoint) {
                return Err(StoreError::DanglingEdge {
                    edge: edge.id.clone(),
                    node: endpoint.to_string(),
                });
            }
        }
        if edge.is_execution() {
            graph.add_edge(index[edge.source.as_str()], index[edge.target.as_str()], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| StoreError::CycleDetected(graph[cycle.node_id()].to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{DecisionConfig, MintConfig, TriggerConfig};

    fn decision(id: &str) -> Node {
        Node::new(id, NodeConfig::Decision(DecisionConfig { prompt: Some("ok?".into()) }))
    }

    fn mint(id: &str) -> Node {
        Node::new(id, NodeConfig::Mint(MintConfig { recipient: Some("0xabc".into()) }))
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let store = WorkflowStore::new();
        store.add_node(decision("d")).unwrap();
        store.add_node(mint("m1")).unwrap();
        store.add_node(mint("m2")).unwrap();
        store.connect(Connection::new("d", "m1", "true")).unwrap();
        store.connect(Connection::new("d", "m2", "false")).unwrap();

        store.remove_node("m1").unwrap();

        let graph = store.snapshot();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].target, "m2");
    }

    #[test]
    fn identical_connections_are_not_duplicated() {
        let store = WorkflowStore::new();
        store.add_node(decision("d")).unwrap();
        store.add_node(mint("m")).unwrap();

        let first = store.connect(Connection::new("d", "m", "true")).unwrap();
        let second = store.connect(Connection::new("d", "m", "true")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.snapshot().edges.len(), 1);
    }

    #[test]
    fn execution_cycles_are_rejected_but_data_loops_are_not() {
        let store = WorkflowStore::new();
        store.add_node(mint("a")).unwrap();
        store.add_node(mint("b")).unwrap();
        store.connect(Connection::new("a", "b", "on-success")).unwrap();

        let err = store.connect(Connection::new("b", "a", "on-success")).unwrap_err();
        assert!(matches!(err, StoreError::CycleDetected(_)));
        assert_eq!(store.snapshot().edges.len(), 1);

        store.connect(Connection::new("b", "a", "data")).unwrap();
        assert_eq!(store.snapshot().edges.len(), 2);
    }

    #[test]
    fn connect_rejects_unknown_endpoints() {
        let store = WorkflowStore::new();
        store.add_node(mint("a")).unwrap();

        let err = store.connect(Connection::new("a", "ghost", "on-success")).unwrap_err();
        assert!(matches!(err, StoreError::DanglingEdge { .. }));
    }

    #[test]
    fn empty_handle_is_a_data_edge() {
        let store = WorkflowStore::new();
        store.add_node(mint("a")).unwrap();
        store.add_node(mint("b")).unwrap();
        let edge = store.connect(Connection::new("a", "b", "")).unwrap();

        assert_eq!(edge.source_handle, None);
        assert!(store.outgoing_execution_edges("a").is_empty());
    }

    #[test]
    fn update_config_keeps_node_kind() {
        let store = WorkflowStore::new();
        store.add_node(decision("d")).unwrap();

        let err = store
            .update_config("d", NodeConfig::Trigger(TriggerConfig::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::KindMismatch { .. }));

        store
            .update_config("d", NodeConfig::Decision(DecisionConfig { prompt: Some("new".into()) }))
            .unwrap();
        let node = store.node("d").unwrap();
        assert_eq!(node.config, NodeConfig::Decision(DecisionConfig { prompt: Some("new".into()) }));
    }

    #[test]
    fn settle_is_ignored_once_a_newer_run_owns_the_node() {
        let store = WorkflowStore::new();
        store.add_node(mint("m")).unwrap();
        let old_run = Uuid::new_v4();
        let new_run = Uuid::new_v4();

        let ticket = store.set_status("m", old_run, NodeStatus::SuccessTransient).unwrap();
        store.set_status("m", new_run, NodeStatus::Pending);

        assert!(!store.settle_status("m", old_run, ticket, NodeStatus::Success));
        assert_eq!(store.status("m"), Some(NodeStatus::Pending));
    }

    #[test]
    fn settle_is_ignored_after_a_later_write_in_the_same_run() {
        let store = WorkflowStore::new();
        store.add_node(mint("m")).unwrap();
        let run = Uuid::new_v4();

        let first_visit = store.set_status("m", run, NodeStatus::SuccessTransient).unwrap();
        store.set_status("m", run, NodeStatus::Pending);
        let second_visit = store.set_status("m", run, NodeStatus::SuccessTransient).unwrap();

        assert!(!store.settle_status("m", run, first_visit, NodeStatus::Success));
        assert_eq!(store.status("m"), Some(NodeStatus::SuccessTransient));
        assert!(store.settle_status("m", run, second_visit, NodeStatus::Success));
        assert_eq!(store.status("m"), Some(NodeStatus::Success));
    }

    #[test]
    fn status_changes_are_broadcast_in_order() {
        let store = WorkflowStore::new();
        store.add_node(mint("m")).unwrap();
        let mut statuses = store.subscribe_statuses();
        let run = Uuid::new_v4();

        store.set_status("m", run, NodeStatus::Pending);
        store.set_status("m", run, NodeStatus::FailTransient);

        assert_eq!(statuses.try_recv().unwrap().status, NodeStatus::Pending);
        assert_eq!(statuses.try_recv().unwrap().status, NodeStatus::FailTransient);
        assert!(store.set_status("gone", run, NodeStatus::Pending).is_none());
    }

    #[test]
    fn replace_ignores_statuses_sent_by_the_editor() {
        let store = WorkflowStore::new();
        store.add_node(mint("kept")).unwrap();
        let run = Uuid::new_v4();
        store.set_status("kept", run, NodeStatus::Success);

        let mut kept = mint("kept");
        kept.status = NodeStatus::Fail;
        let mut fresh = mint("fresh");
        fresh.status = NodeStatus::Fail;
        fresh.run_id = Some(Uuid::new_v4());
        store
            .replace(Workflow {
                nodes: vec![kept, fresh],
                edges: vec![],
            })
            .unwrap();

        assert_eq!(store.status("kept"), Some(NodeStatus::Success));
        assert_eq!(store.node("kept").unwrap().run_id, Some(run));
        let fresh = store.node("fresh").unwrap();
        assert_eq!(fresh.status, NodeStatus::Idle);
        assert_eq!(fresh.run_id, None);
    }

    #[test]
    fn replace_rejects_duplicate_node_ids() {
        let store = WorkflowStore::new();
        let workflow = Workflow {
            nodes: vec![mint("a"), mint("a")],
            edges: vec![],
        };
        assert_eq!(store.replace(workflow), Err(StoreError::DuplicateNode("a".into())));
    }
}
