/// Workflow Management Layer
///
/// This module handles workflow definitions, persistence, and hot-reload registry.
/// It provides the core workflow management functionality including:
/// - Type definitions (Workflow, WorkflowNode, WorkflowEdge, RunContext)
/// - Execution records and the tracker state machine
/// - SQLite persistence with sqlx
/// - Lock-free hot-reload registry using ArcSwap

// Core workflow type definitions
pub mod types;

// Execution records, status state machine, and the append-only log
pub mod execution;

// SQLite persistence layer for workflows and connections
pub mod storage;

// Hot-reload registry using ArcSwap for zero-downtime updates
pub mod registry;

// Re-export commonly used types
pub use execution::{ExecutionStatus, ExecutionTracker, WorkflowExecution};
pub use types::{NodeKind, RunContext, Workflow, WorkflowEdge, WorkflowNode};
