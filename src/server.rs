/// Server setup and initialization
///
/// Wires together all components: storage, registry, collaborators, execution
/// engine, scheduler, and HTTP routes. Provides the main application factory
/// function for creating the Axum app.

use crate::{
    actions::ActionService,
    api::{create_connection_routes, create_execute_routes, create_workflow_routes, AppState},
    config::Config,
    llm::OpenRouterService,
    runtime::{engine::WorkflowEngine, executor::NodeExecutor, scheduler::MonitorSchedulerService},
    sources::DataConnectorService,
    workflow::{registry::WorkflowRegistry, storage::WorkflowStorage},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes and middleware
///
/// Initializes all components and wires them together into a complete
/// application: database, registry, collaborators, engine, scheduler, and
/// the HTTP router.
pub async fn create_app(config: Config) -> Result<Router> {
    // Initialize workflow and connection storage
    tracing::info!("📋 Initializing storage");
    let storage = WorkflowStorage::connect(&config.database.data_dir).await?;

    // Initialize workflow registry and load existing workflows
    tracing::info!("📊 Initializing workflow registry");
    let registry = Arc::new(WorkflowRegistry::new(storage.clone()));

    tracing::info!("📥 Loading existing workflows from storage");
    registry
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load workflows from storage: {}", e))?;

    // Construct the collaborators the engine is injected with
    tracing::info!("🔌 Initializing collaborators");
    let sources: Arc<dyn crate::sources::DataSource> = Arc::new(DataConnectorService::new());
    let llm: Arc<dyn crate::llm::LanguageModel> = Arc::new(OpenRouterService::new(&config.openrouter)?);
    let actions: Arc<dyn crate::actions::ActionSink> = Arc::new(ActionService::new());

    // Initialize execution components
    tracing::info!("⚙️ Initializing node executor");
    let executor = Arc::new(NodeExecutor::new(
        Arc::clone(&sources),
        Arc::clone(&llm),
        Arc::clone(&actions),
    ));

    tracing::info!("🚀 Initializing execution engine");
    let engine = Arc::new(WorkflowEngine::new(Arc::clone(&executor)));

    // Initialize monitor scheduler service
    tracing::info!("⏰ Initializing monitor scheduler service");
    let scheduler = Arc::new(
        MonitorSchedulerService::new(Arc::clone(&registry), Arc::clone(&engine))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize monitor scheduler: {}", e))?,
    );

    // Start the scheduler in background
    tracing::info!("🚀 Starting monitor scheduler");
    let scheduler_clone = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if let Err(e) = scheduler_clone.start().await {
            tracing::error!("❌ Failed to start monitor scheduler: {}", e);
        }
    });

    // Create application state
    tracing::info!("🏗️ Creating application state");
    let app_state = AppState {
        storage,
        registry,
        scheduler,
        engine,
        sources,
        llm,
        actions,
    };

    // Create the main application router
    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow management API routes
        .merge(create_workflow_routes())
        // Connection management API routes
        .merge(create_connection_routes())
        // Execution and collaborator test routes
        .merge(create_execute_routes())
        .with_state(app_state);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured
/// address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Signalway server...");

    // Create the application
    let app = create_app(config.clone()).await?;

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    // Start the server
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
