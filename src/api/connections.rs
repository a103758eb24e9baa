/// Connection management REST API endpoints
///
/// CRUD over stored data source connections plus a per-connection test that
/// updates the connection's health bookkeeping. The most recently updated
/// active connection backs the chat-to-SQL agent and the schema endpoint.

use crate::api::workflows::AppState;
use crate::workflow::storage::{ConnectionStatus, StoredConnection};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Response for connection creation/update operations
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub id: String,
    pub message: String,
}

/// Request body for connection creation and update
#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub connection: StoredConnection,
}

/// Create connection management routes
pub fn create_connection_routes() -> Router<AppState> {
    Router::new()
        .route("/api/connections", post(create_connection))
        .route("/api/connections", get(list_connections))
        .route("/api/connections/{id}", get(get_connection))
        .route("/api/connections/{id}", put(update_connection))
        .route("/api/connections/{id}", delete(delete_connection))
        .route("/api/connections/{id}/test", post(test_connection))
}

/// Create a new connection
///
/// POST /api/connections
/// Body: { "connection": { "name": "...", "config": { "type": "supabase", ... } } }
async fn create_connection(
    State(state): State<AppState>,
    Json(payload): Json<CreateConnectionRequest>,
) -> Result<Json<ConnectionResponse>, StatusCode> {
    let mut connection = payload.connection;

    if connection.name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if connection.id.is_empty() {
        connection.id = format!("conn-{}", Uuid::new_v4());
    }
    if connection.created_at.is_none() {
        connection.created_at = Some(Utc::now());
    }

    match state.storage.get_connection(&connection.id).await {
        Ok(Some(_)) => return Err(StatusCode::CONFLICT),
        Ok(None) => {}
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.storage.save_connection(&connection).await {
        tracing::error!("Failed to save connection: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("🔌 Created connection: {} ({})", connection.id, connection.name);

    Ok(Json(ConnectionResponse {
        id: connection.id.clone(),
        message: format!("Connection '{}' created successfully", connection.name),
    }))
}

/// List all connections
///
/// GET /api/connections
async fn list_connections(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.storage.list_connections().await {
        Ok(connections) => Ok(Json(json!({ "connections": connections }))),
        Err(e) => {
            tracing::error!("Failed to list connections: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get a specific connection by ID
///
/// GET /api/connections/:id
async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredConnection>, StatusCode> {
    match state.storage.get_connection(&id).await {
        Ok(Some(connection)) => Ok(Json(connection)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get connection {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Update an existing connection
///
/// PUT /api/connections/:id
async fn update_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CreateConnectionRequest>,
) -> Result<Json<ConnectionResponse>, StatusCode> {
    let mut connection = payload.connection;
    connection.id = id.clone();

    if connection.name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.storage.get_connection(&id).await {
        Ok(Some(existing)) => {
            // Preserve bookkeeping the client does not resend
            if connection.created_at.is_none() {
                connection.created_at = existing.created_at;
            }
            if connection.last_tested.is_none() {
                connection.last_tested = existing.last_tested;
            }
        }
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.storage.save_connection(&connection).await {
        tracing::error!("Failed to update connection: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("🔌 Updated connection: {} ({})", connection.id, connection.name);

    Ok(Json(ConnectionResponse {
        id: connection.id.clone(),
        message: format!("Connection '{}' updated successfully", connection.name),
    }))
}

/// Delete a connection
///
/// DELETE /api/connections/:id
async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.storage.delete_connection(&id).await {
        Ok(true) => {
            tracing::info!("Deleted connection: {}", id);
            Ok(Json(json!({ "message": "Connection deleted successfully" })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete connection: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Probe a stored connection and record the result
///
/// POST /api/connections/:id/test
async fn test_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut connection = match state.storage.get_connection(&id).await {
        Ok(Some(connection)) => connection,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get connection {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let test = match state.sources.test_connection(&connection.config).await {
        Ok(test) => test,
        Err(e) => {
            tracing::error!("Connection test failed for {}: {}", id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    connection.status = if test.success {
        ConnectionStatus::Connected
    } else {
        ConnectionStatus::Error
    };
    connection.last_tested = Some(Utc::now());

    if let Err(e) = state.storage.save_connection(&connection).await {
        tracing::error!("Failed to record connection test for {}: {}", id, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!(
        "🔍 Tested connection {}: {}",
        id,
        if test.success { "connected" } else { "error" }
    );

    Ok(Json(json!({
        "success": test.success,
        "message": test.message,
        "connectionTime": test.connection_time,
        "status": connection.status,
    })))
}
