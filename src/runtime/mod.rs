/// Runtime Execution Engine
///
/// This module provides the petgraph-based DAG execution engine for workflows.
/// It handles:
/// - Converting node/edge definitions to petgraph DAGs
/// - Topological execution order with up-front cycle detection
/// - Per-node dispatch against the injected collaborators
/// - Cron-scheduled monitor runs

// Core execution engine using petgraph for DAG processing
pub mod engine;

// Individual node execution handlers
pub mod executor;

// Background cron scheduler service for scheduled monitor nodes
pub mod scheduler;

// Re-export main types
pub use engine::{execution_order, WorkflowEngine};
pub use executor::NodeExecutor;
pub use scheduler::MonitorSchedulerService;
