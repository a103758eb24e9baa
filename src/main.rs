/// Signalway: LLM-assisted analytics monitoring automation engine
///
/// Main entry point for the Signalway server. Initializes configuration and
/// starts the HTTP server with workflow management and execution capabilities.

use signalway::{config::Config, server::start_server};

/// Application entry point
///
/// Initializes the server with default configuration and starts listening for
/// requests. The server provides:
/// - Workflow management API at /api/workflows/*
/// - Connection management API at /api/connections/*
/// - Workflow execution at /api/workflow/execute
/// - Chat-to-SQL at /api/query
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3001 and a local SQLite database)
    let config = Config::default();

    // Start the server
    start_server(config).await?;

    Ok(())
}
