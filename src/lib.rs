/// Automata: runtime for no-code on-chain automations
///
/// Executes workflows built on a visual canvas: on-chain event triggers feed
/// an engine that walks AI decision gates and relay-backed actions, tracking a
/// status lifecycle on every node.

// Core configuration and setup
pub mod config;

// Error taxonomy shared by the store, dispatchers and ledger access
pub mod error;

// Workflow graph layer - node/edge types and the in-memory store
pub mod workflow;

// Ledger access - events, log queries and decoding
pub mod chain;

// Runtime - execution engine, dispatchers and trigger cursors
pub mod runtime;

// HTTP API layer - graph editing, status reads and test runs
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use runtime::{ExecutionEngine, RunSummary};
pub use server::start_server;
pub use workflow::{Edge, Node, NodeConfig, NodeStatus, Workflow, WorkflowStore};
