/// HTTP API Layer
///
/// This module provides the REST API endpoints for workflow management,
/// connection management, and execution. It handles:
/// - Workflow CRUD operations with hot-reload
/// - Connection CRUD and health probing
/// - Workflow execution and the collaborator test endpoints
/// - The chat-to-SQL query surface

// Workflow management endpoints (POST/GET/PUT/DELETE)
pub mod workflows;

// Connection management endpoints
pub mod connections;

// Execution, collaborator test, and chat-to-SQL endpoints
pub mod execute;

// Re-export router builders
pub use connections::create_connection_routes;
pub use execute::create_execute_routes;
pub use workflows::{create_workflow_routes, AppState};
