/// Workflow management REST API endpoints
///
/// Provides CRUD operations for workflow definitions with hot-reload support.
/// All changes trigger immediate registry and schedule updates, so the next
/// execution or cron firing always sees the saved definition.

use crate::{
    actions::ActionSink,
    llm::LanguageModel,
    runtime::{engine::WorkflowEngine, scheduler::MonitorSchedulerService},
    sources::DataSource,
    workflow::{
        registry::{compile_single_workflow, WorkflowRegistry},
        storage::WorkflowStorage,
        types::Workflow,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Persistent storage for workflows and connections
    pub storage: WorkflowStorage,
    /// Hot-reload registry for in-memory workflows
    pub registry: Arc<WorkflowRegistry>,
    /// Cron scheduler for monitor nodes
    pub scheduler: Arc<MonitorSchedulerService>,
    /// Workflow execution engine
    pub engine: Arc<WorkflowEngine>,
    /// Data source collaborator
    pub sources: Arc<dyn DataSource>,
    /// Language model collaborator
    pub llm: Arc<dyn LanguageModel>,
    /// Notification sink collaborator
    pub actions: Arc<dyn ActionSink>,
}

/// Response for workflow creation/update operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
}

/// Request body for workflow creation and update
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub workflow: Workflow,
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}", put(update_workflow))
        .route("/api/workflows/{id}", delete(delete_workflow))
}

/// Create a new workflow
///
/// POST /api/workflows
/// Body: { "workflow": { "id": "...", "name": "...", "nodes": [...], "edges": [...] } }
async fn create_workflow(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let workflow = payload.workflow;

    if workflow.id.is_empty() || workflow.name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Cyclic or dangling graphs never reach storage
    if let Err(e) = compile_single_workflow(workflow.clone()) {
        tracing::warn!("❌ Rejected workflow '{}': {}", workflow.id, e);
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.storage.get_workflow(&workflow.id).await {
        Ok(Some(_)) => return Err(StatusCode::CONFLICT),
        Ok(None) => {}
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.storage.save_workflow(&workflow).await {
        tracing::error!("Failed to save workflow: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Err(e) = state.registry.reload_workflow(&workflow.id).await {
        tracing::error!("Failed to reload workflow into registry: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Err(e) = sync_schedules(&state, &workflow.id).await {
        tracing::error!("Failed to register monitor schedules for workflow {}: {}", workflow.id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("🔥 Created workflow: {} ({})", workflow.id, workflow.name);

    Ok(Json(WorkflowResponse {
        id: workflow.id.clone(),
        message: format!("Workflow '{}' created successfully", workflow.name),
    }))
}

/// List all workflows
///
/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.storage.list_workflows().await {
        Ok(workflows) => Ok(Json(json!({ "workflows": workflows }))),
        Err(e) => {
            tracing::error!("Failed to list workflows: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get a specific workflow by ID
///
/// GET /api/workflows/:id
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, StatusCode> {
    match state.storage.get_workflow(&id).await {
        Ok(Some(workflow)) => Ok(Json(workflow)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get workflow {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Update an existing workflow
///
/// PUT /api/workflows/:id
async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let mut workflow = payload.workflow;

    // The URL parameter wins over whatever id the body carries
    workflow.id = id.clone();

    if workflow.name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if let Err(e) = compile_single_workflow(workflow.clone()) {
        tracing::warn!("❌ Rejected workflow update '{}': {}", workflow.id, e);
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.storage.get_workflow(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.storage.save_workflow(&workflow).await {
        tracing::error!("Failed to update workflow: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Err(e) = state.registry.reload_workflow(&workflow.id).await {
        tracing::error!("Failed to reload updated workflow into registry: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    if let Err(e) = sync_schedules(&state, &workflow.id).await {
        tracing::error!("Failed to hot-reload monitor schedules for workflow {}: {}", workflow.id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("🔥 Hot-reloaded workflow: {} ({})", workflow.id, workflow.name);

    Ok(Json(WorkflowResponse {
        id: workflow.id.clone(),
        message: format!("Workflow '{}' updated successfully", workflow.name),
    }))
}

/// Delete a workflow
///
/// DELETE /api/workflows/:id
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    // Drop schedules first so nothing fires mid-delete
    state.scheduler.remove_workflow_schedules(&id).await;

    if let Err(e) = state.registry.remove_workflow(&id).await {
        tracing::error!("Failed to remove workflow from registry: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    match state.storage.delete_workflow(&id).await {
        Ok(true) => {
            tracing::info!("Deleted workflow: {}", id);
            Ok(Json(json!({ "message": "Workflow deleted successfully" })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete workflow: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Push the registry's compiled schedules for one workflow into the scheduler
async fn sync_schedules(state: &AppState, workflow_id: &str) -> anyhow::Result<()> {
    if let Some(compiled) = state.registry.get_workflow(workflow_id) {
        state.scheduler.add_or_update_workflow_schedules(&compiled).await?;
    }
    Ok(())
}
