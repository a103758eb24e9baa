/// Signalway: LLM-assisted analytics monitoring automation engine
///
/// This library provides the workflow execution engine behind the monitoring
/// builder: petgraph-based DAG execution over data-connector, schema-
/// interpreter, monitor-builder, and action-executor nodes, with hot-reload
/// workflow management and scheduled monitor runs.

// Core configuration and setup
pub mod config;

// Workflow management layer - definitions, execution records, storage, registry
pub mod workflow;

// Runtime execution engine - petgraph DAG execution and node orchestration
pub mod runtime;

// External collaborators - data sources, language model, notification sinks
pub mod sources;
pub mod llm;
pub mod actions;

// HTTP API layer - REST endpoints for management, execution, and chat-to-SQL
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use runtime::{NodeExecutor, WorkflowEngine};
pub use server::start_server;
pub use workflow::{ExecutionStatus, Workflow, WorkflowEdge, WorkflowExecution, WorkflowNode};
