/// Execution and collaborator test endpoints
///
/// The execute endpoint is the public contract of the engine: it accepts a
/// workflow graph, runs it, and always answers with a well-formed execution
/// record (HTTP 200 for both completed and failed runs). The remaining
/// endpoints exercise the collaborators individually for the builder UI, and
/// the query/schema pair serves the chat-to-SQL surface over the active
/// stored connection.

use crate::api::workflows::AppState;
use crate::llm::schema_context;
use crate::workflow::execution::ExecutionStatus;
use crate::workflow::types::{
    ActionKind, ActionNodeConfig, ConnectionProfile, SourceKind, WorkflowEdge, WorkflowNode,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Create execution and collaborator test routes
pub fn create_execute_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow/execute", post(execute_workflow))
        .route("/api/workflow/test-connection", post(test_connection))
        .route("/api/workflow/interpret-schema", post(interpret_schema))
        .route("/api/workflow/generate-query", post(generate_query))
        .route("/api/workflow/test-action", post(test_action))
        .route("/api/query", post(answer_query))
        .route("/api/schema", get(get_schema))
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() })))
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message.into() })))
}

/// Request body for workflow execution
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflowRequest {
    pub workflow_id: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

/// Connection configuration as the builder sends it
///
/// Everything is optional at the wire level; the handlers report which
/// required field is missing instead of letting deserialization reject the
/// whole body opaquely.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfigRequest {
    #[serde(rename = "type")]
    pub kind: Option<SourceKind>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub database: Option<String>,
}

impl ConnectionConfigRequest {
    /// Resolve into a full profile, naming the first missing field
    fn into_profile(self) -> Result<ConnectionProfile, ApiError> {
        let kind = self
            .kind
            .ok_or_else(|| bad_request("Missing required connection fields (type, endpoint, apiKey)"))?;
        let endpoint = self
            .endpoint
            .filter(|v| !v.is_empty())
            .ok_or_else(|| bad_request("Missing required connection fields (type, endpoint, apiKey)"))?;
        let api_key = self
            .api_key
            .filter(|v| !v.is_empty())
            .ok_or_else(|| bad_request("Missing required connection fields (type, endpoint, apiKey)"))?;

        Ok(ConnectionProfile {
            kind,
            endpoint,
            api_key,
            database: self.database,
        })
    }
}

/// Execute a complete workflow
///
/// POST /api/workflow/execute
/// Body: { "workflowId": "...", "nodes": [...], "edges": [...] }
///
/// Responds 200 with the execution record for any run that reached a
/// terminal state; the record's status tells the caller whether it
/// completed. Malformed bodies are rejected with 400 before a run starts.
async fn execute_workflow(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.workflow_id.is_empty() {
        return Err(bad_request("Workflow ID, nodes, and edges are required"));
    }

    let execution = state
        .engine
        .execute_workflow(&payload.workflow_id, &payload.nodes, &payload.edges)
        .await;

    Ok(Json(json!({
        "success": execution.status == ExecutionStatus::Completed,
        "execution": execution,
    })))
}

/// Request body for connection testing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub connection_config: ConnectionConfigRequest,
}

/// Probe a data source connection
///
/// POST /api/workflow/test-connection
/// Body: { "connectionConfig": { "type": "supabase", "endpoint": "...", "apiKey": "..." } }
async fn test_connection(
    State(state): State<AppState>,
    Json(payload): Json<TestConnectionRequest>,
) -> Result<Json<Value>, ApiError> {
    let profile = payload.connection_config.into_profile()?;

    let test = state
        .sources
        .test_connection(&profile)
        .await
        .map_err(|e| internal_error(format!("Connection test failed: {}", e)))?;

    if test.success {
        Ok(Json(json!({
            "success": true,
            "message": test.message,
            "connectionTime": test.connection_time,
        })))
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": test.message })),
        ))
    }
}

/// Request body for schema interpretation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretSchemaRequest {
    pub connection_config: ConnectionConfigRequest,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// Fetch a source's schema and interpret it with the language model
///
/// POST /api/workflow/interpret-schema
async fn interpret_schema(
    State(state): State<AppState>,
    Json(payload): Json<InterpretSchemaRequest>,
) -> Result<Json<Value>, ApiError> {
    let profile = payload.connection_config.into_profile()?;
    let model = payload
        .model
        .unwrap_or_else(|| crate::llm::DEFAULT_MODEL.to_string());
    let temperature = payload.temperature.unwrap_or(0.7);

    let schema = state
        .sources
        .fetch_schema(&profile)
        .await
        .map_err(|e| internal_error(format!("Failed to interpret schema: {}", e)))?;

    let schema_json = serde_json::to_string_pretty(&schema)
        .map_err(|e| internal_error(format!("Failed to interpret schema: {}", e)))?;

    let interpretation = state
        .llm
        .interpret_schema(&schema_json, &model, temperature)
        .await
        .map_err(|e| internal_error(format!("Failed to interpret schema: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "schema": schema,
        "interpretation": interpretation,
        "model": model,
    })))
}

/// Request body for monitor query generation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQueryRequest {
    pub entity_description: Option<String>,
    pub condition: Option<String>,
    pub model: Option<String>,
}

/// Generate a monitoring query for a condition
///
/// POST /api/workflow/generate-query
async fn generate_query(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let entity_description = payload
        .entity_description
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("Entity description and condition are required"))?;
    let condition = payload
        .condition
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("Entity description and condition are required"))?;
    let model = payload
        .model
        .unwrap_or_else(|| crate::llm::DEFAULT_MODEL.to_string());

    let generated = state
        .llm
        .generate_monitor_query(&entity_description, &condition, &model)
        .await
        .map_err(|e| internal_error(format!("Failed to generate query: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "query": generated.query,
        "explanation": generated.explanation,
        "model": model,
    })))
}

/// Request body for action testing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestActionRequest {
    pub action_config: ActionNodeConfig,
}

/// Dry-run a notification channel with sample data
///
/// POST /api/workflow/test-action
async fn test_action(
    State(state): State<AppState>,
    Json(payload): Json<TestActionRequest>,
) -> Result<Json<Value>, ApiError> {
    let config = payload.action_config;

    // Per-channel required fields are checked up front so the builder gets a
    // precise message instead of a failed delivery attempt
    let Some(kind) = config.action_type else {
        return Err(bad_request("Action type is required"));
    };
    match kind {
        ActionKind::Slack if config.slack_webhook.as_deref().unwrap_or("").is_empty() => {
            return Err(bad_request("Slack webhook URL is required"));
        }
        ActionKind::Email if config.email_recipients.as_deref().unwrap_or("").is_empty() => {
            return Err(bad_request("Email recipients are required"));
        }
        ActionKind::Webhook if config.webhook_url.as_deref().unwrap_or("").is_empty() => {
            return Err(bad_request("Webhook URL is required"));
        }
        _ => {}
    }

    let outcome = state
        .actions
        .test_action(&config)
        .await
        .map_err(|e| internal_error(format!("Action test failed: {}", e)))?;

    if outcome.success {
        Ok(Json(json!({
            "success": true,
            "message": outcome.message,
            "timestamp": outcome.timestamp,
        })))
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": outcome.error.unwrap_or(outcome.message),
            })),
        ))
    }
}

/// Request body for the chat-to-SQL agent
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Answer a natural-language question with SQL over the active connection
///
/// POST /api/query
/// Body: { "question": "How many signups this week?", "context": "..." }
async fn answer_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let question = payload
        .question
        .filter(|q| !q.is_empty())
        .ok_or_else(|| bad_request("Question is required"))?;
    let context = payload.context.unwrap_or_default();

    let connection = state
        .storage
        .active_connection()
        .await
        .map_err(|e| internal_error(format!("Failed to process query: {}", e)))?
        .ok_or_else(|| bad_request("No active data source connection"))?;

    let schema = state
        .sources
        .fetch_schema(&connection.config)
        .await
        .map_err(|e| internal_error(format!("Failed to process query: {}", e)))?;

    let answer = state
        .llm
        .answer_question(&question, &context, &schema_context(&schema))
        .await
        .map_err(|e| internal_error(format!("Failed to process query: {}", e)))?;

    let data = state
        .sources
        .execute_query(&connection.config, &answer.sql)
        .await
        .map_err(|e| internal_error(format!("Failed to process query: {}", e)))?;

    // Follow-up suggestions are best-effort; a failure never loses the answer
    let sample = serde_json::to_string(&data.iter().take(2).collect::<Vec<_>>()).unwrap_or_default();
    let summary = format!("Query returned {} rows. Sample data: {}", data.len(), sample);
    let follow_ups = match state.llm.suggest_follow_ups(&question, &summary).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!("⚠️ Follow-up suggestion failed: {}", e);
            Vec::new()
        }
    };

    Ok(Json(json!({
        "result": {
            "sql": answer.sql,
            "data": data,
            "explanation": answer.explanation,
            "chartType": answer.chart_type,
        },
        "followUpSuggestions": follow_ups,
    })))
}

/// Introspect the active connection's schema for the chat surface
///
/// GET /api/schema
async fn get_schema(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let connection = state
        .storage
        .active_connection()
        .await
        .map_err(|e| internal_error(format!("Failed to fetch schema information: {}", e)))?
        .ok_or_else(|| bad_request("No active data source connection"))?;

    let schema = state
        .sources
        .fetch_schema(&connection.config)
        .await
        .map_err(|e| internal_error(format!("Failed to fetch schema information: {}", e)))?;

    Ok(Json(json!({
        "schemas": schema.tables,
        "schemaContext": schema_context(&schema),
    })))
}
