/// HTTP API Layer
///
/// This module provides the REST API the canvas editor talks to:
/// - Graph reads and edits (nodes, edges, whole-workflow replace)
/// - Per-node status reads
/// - Test runs from a configured trigger

// Graph management endpoints
pub mod workflows;

// Test-run and trigger endpoints
pub mod runs;

// Re-export router builders
pub use runs::create_run_routes;
pub use workflows::{create_workflow_routes, AppState};
