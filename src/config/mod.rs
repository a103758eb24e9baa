/// Configuration management for the Signalway engine
/// 
/// Handles server configuration, storage location, and OpenRouter credentials.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// OpenRouter (language model) configuration
    pub openrouter: OpenRouterConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding signalway.db (default: "data")
    pub data_dir: String,
}

/// OpenRouter chat-completions client configuration
/// 
/// The API key is mandatory at client construction; the referer/title headers
/// identify this deployment to OpenRouter's dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key, read from OPENROUTER_API_KEY
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Value for the HTTP-Referer header
    pub app_url: String,
    /// Value for the X-Title header
    pub app_name: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("SIGNALWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SIGNALWAY_PORT")
                    .unwrap_or_else(|_| "3001".to_string())
                    .parse()
                    .unwrap_or(3001),
            },
            database: DatabaseConfig {
                data_dir: std::env::var("SIGNALWAY_DATA_DIR")
                    .unwrap_or_else(|_| "data".to_string()),
            },
            openrouter: OpenRouterConfig {
                api_key: std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                base_url: "https://openrouter.ai/api/v1".to_string(),
                app_url: std::env::var("OPENROUTER_APP_URL")
                    .unwrap_or_else(|_| "http://localhost:3001".to_string()),
                app_name: std::env::var("OPENROUTER_APP_NAME")
                    .unwrap_or_else(|_| "Signalway".to_string()),
            },
        }
    }
}
