/// Workflow graph REST API endpoints
///
/// The editor's read/write surface onto the in-memory graph. Every edit goes
/// through a named `WorkflowStore` operation; the trigger supervisor picks up
/// the resulting change events on its own.

use crate::{
    error::StoreError,
    runtime::{engine::ExecutionEngine, triggers::TriggerSupervisor},
    workflow::{
        store::WorkflowStore,
        types::{Connection, Edge, Node, NodeConfig, NodeStatus, Workflow},
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// In-memory workflow graph
    pub store: Arc<WorkflowStore>,
    /// Execution engine for test runs
    pub engine: Arc<ExecutionEngine>,
    /// Trigger cursor supervisor
    pub supervisor: Arc<TriggerSupervisor>,
}

/// Response for graph edit operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusResponse {
    pub node_id: String,
    pub status: NodeStatus,
}

/// Create workflow graph routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow", get(get_workflow).put(replace_workflow))
        .route("/api/nodes", post(add_node))
        .route("/api/nodes/{id}", put(update_node).delete(remove_node))
        .route("/api/nodes/{id}/status", get(node_status))
        .route("/api/edges", post(connect))
        .route("/api/edges/{id}", delete(disconnect))
}

/// Map graph edit failures onto HTTP status codes
pub(crate) fn store_error_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::NodeNotFound(_) | StoreError::EdgeNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateNode(_) | StoreError::DuplicateEdge(_) => StatusCode::CONFLICT,
        StoreError::DanglingEdge { .. } | StoreError::KindMismatch { .. } | StoreError::CycleDetected(_) => {
            StatusCode::BAD_REQUEST
        }
    }
}

fn reject(operation: &str, error: StoreError) -> StatusCode {
    tracing::warn!("❌ {} rejected: {}", operation, error);
    store_error_status(&error)
}

/// Get the whole graph with current statuses
///
/// GET /api/workflow
async fn get_workflow(State(state): State<AppState>) -> Json<Workflow> {
    Json((*state.store.snapshot()).clone())
}

/// Replace the whole graph
///
/// PUT /api/workflow
/// Body: { "nodes": [...], "edges": [...] }
async fn replace_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let (nodes, edges) = (workflow.nodes.len(), workflow.edges.len());
    state
        .store
        .replace(workflow)
        .map_err(|e| reject("Workflow replace", e))?;

    tracing::info!("🔥 Loaded workflow with {} nodes and {} edges", nodes, edges);
    Ok(Json(WorkflowResponse {
        message: format!("Workflow loaded with {nodes} nodes and {edges} edges"),
    }))
}

/// Add a node
///
/// POST /api/nodes
/// Body: { "id": "...", "config": { "kind": "...", ... } }
async fn add_node(State(state): State<AppState>, Json(node): Json<Node>) -> Result<Json<Node>, StatusCode> {
    let node_id = node.id.clone();
    if node_id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    state.store.add_node(node).map_err(|e| reject("Add node", e))?;

    state.store.node(&node_id).map(Json).ok_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Replace a node's configuration
///
/// PUT /api/nodes/{id}
/// Body: { "kind": "...", ... }
async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<NodeConfig>,
) -> Result<Json<Node>, StatusCode> {
    state
        .store
        .update_config(&id, config)
        .map_err(|e| reject("Update node", e))?;

    state.store.node(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Remove a node and its edges
///
/// DELETE /api/nodes/{id}
async fn remove_node(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    state.store.remove_node(&id).map_err(|e| reject("Remove node", e))?;
    Ok(Json(json!({ "message": format!("Node '{id}' removed") })))
}

/// GET /api/nodes/{id}/status
async fn node_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeStatusResponse>, StatusCode> {
    let status = state.store.status(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(NodeStatusResponse { node_id: id, status }))
}

/// Connect two ports
///
/// POST /api/edges
/// Body: { "source": "...", "target": "...", "sourceHandle": "on-success" }
async fn connect(State(state): State<AppState>, Json(connection): Json<Connection>) -> Result<Json<Edge>, StatusCode> {
    state
        .store
        .connect(connection)
        .map(Json)
        .map_err(|e| reject("Connect", e))
}

/// DELETE /api/edges/{id}
async fn disconnect(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Edge>, StatusCode> {
    state
        .store
        .disconnect(&id)
        .map(Json)
        .map_err(|e| reject("Disconnect", e))
}
