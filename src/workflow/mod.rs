/// Workflow Management Layer
///
/// Holds the graph the editor builds and the engine walks:
/// - Type definitions (Node, NodeConfig, Edge, NodeStatus)
/// - The owned, lock-free `WorkflowStore` with change and status broadcasts

// Core workflow type definitions
pub mod types;

// In-memory graph store using ArcSwap for lock-free snapshots
pub mod store;

// Re-export commonly used types
pub use store::{GraphChange, StatusChange, StatusTicket, WorkflowStore};
pub use types::{Connection, Edge, Node, NodeConfig, NodeStatus, Workflow};
