/// Runtime Execution Engine
///
/// This module runs workflows. It handles:
/// - Walking execution edges and branching on decisions
/// - Driving node status through its lifecycle
/// - Calling the inference and relay services for each node kind
/// - Polling the ledger for trigger events

// Graph interpreter and per-node lifecycle
pub mod engine;

// Per-kind action dispatchers
pub mod dispatch;

// Inference and relay service clients
pub mod services;

// Per-trigger block cursor with dedup and sender exclusion
pub mod cursor;

// Background supervisor owning one polling loop per trigger
pub mod triggers;

// Re-export main types
pub use cursor::EventCursor;
pub use dispatch::ActionDispatcher;
pub use engine::{ExecutionEngine, RunStep, RunSummary, StepOutcome};
pub use services::{HttpInferenceService, HttpRelayService, InferenceService, RelayService};
pub use triggers::TriggerSupervisor;
