/// Run endpoints
///
/// Test runs start a workflow from a configured trigger with caller-supplied
/// event data, exactly as if its cursor had decoded that log.

use crate::api::workflows::AppState;
use crate::runtime::engine::RunSummary;
use crate::workflow::types::NodeConfig;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Body for POST /api/test-run
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunRequest {
    pub trigger_node_id: String,
    #[serde(default)]
    pub data: Value,
}

pub fn create_run_routes() -> Router<AppState> {
    Router::new()
        .route("/api/test-run", post(test_run))
        .route("/api/triggers", get(active_triggers))
}

/// Run the workflow from a configured trigger
///
/// POST /api/test-run
/// Body: { "triggerNodeId": "...", "data": { "from": "0x...", "to": "0x...", "value": "..." } }
/// Node failures are reported in the summary, not as an HTTP error.
async fn test_run(
    State(state): State<AppState>,
    Json(request): Json<TestRunRequest>,
) -> Result<Json<RunSummary>, StatusCode> {
    tracing::info!("🧪 Test run requested from trigger '{}'", request.trigger_node_id);

    let node = state
        .store
        .node(&request.trigger_node_id)
        .ok_or(StatusCode::NOT_FOUND)?;

    match &node.config {
        NodeConfig::Trigger(config) if config.is_configured() => {}
        NodeConfig::Trigger(_) => {
            tracing::warn!("❌ Trigger '{}' is not configured", node.id);
            return Err(StatusCode::BAD_REQUEST);
        }
        _ => {
            tracing::warn!("❌ Node '{}' is a {} node, not a trigger", node.id, node.kind());
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let summary = state.engine.execute_workflow(&node.id, request.data).await;
    Ok(Json(summary))
}

/// Trigger nodes with a running cursor
///
/// GET /api/triggers
async fn active_triggers(State(state): State<AppState>) -> Json<Value> {
    let triggers = state.supervisor.active_triggers().await;
    Json(json!({ "triggers": triggers }))
}
