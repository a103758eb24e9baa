/// Node execution handlers for the four pipeline stages
///
/// Dispatches each node to its handler, validates the configuration that
/// stage requires, performs the side effect through the injected
/// collaborators, and writes the stage's outputs into the run context for
/// downstream nodes. Any handler error aborts the run; nothing is retried.

use crate::actions::ActionSink;
use crate::llm::{LanguageModel, DEFAULT_MODEL};
use crate::sources::DataSource;
use crate::workflow::execution::{ExecutionTracker, LogLevel};
use crate::workflow::types::{
    ActionNodeConfig, ConnectionProfile, ConnectorConfig, InterpreterConfig, MonitorConfig,
    NodeKind, RunContext, WorkflowNode,
};
use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Executes individual nodes against the injected collaborators
///
/// The collaborators are trait objects handed in at construction, so the
/// engine can run against the real services or against test doubles.
pub struct NodeExecutor {
    sources: Arc<dyn DataSource>,
    llm: Arc<dyn LanguageModel>,
    actions: Arc<dyn ActionSink>,
}

impl NodeExecutor {
    pub fn new(sources: Arc<dyn DataSource>, llm: Arc<dyn LanguageModel>, actions: Arc<dyn ActionSink>) -> Self {
        Self { sources, llm, actions }
    }

    /// Execute a single node, mutating the shared run context
    ///
    /// Logs the node's start and its success or failure into the tracker;
    /// failures propagate so the engine can halt the run.
    pub async fn execute_node(
        &self,
        node: &WorkflowNode,
        context: &mut RunContext,
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        tracker.log(LogLevel::Info, &node.id, format!("Executing node: {}", node.display_label()), None);
        tracing::info!("🚀 Starting node execution: {} (type: {})", node.id, node.kind.name());

        let start = std::time::Instant::now();

        let result = match &node.kind {
            NodeKind::DataConnector(config) => self.execute_data_connector(node, config, context, tracker).await,
            NodeKind::SchemaInterpreter(config) => self.execute_schema_interpreter(node, config, context, tracker).await,
            NodeKind::MonitorBuilder(config) => self.execute_monitor_builder(node, config, context, tracker).await,
            NodeKind::ActionExecutor(config) => self.execute_action_executor(node, config, context, tracker).await,
            NodeKind::ChatInterface => {
                // The engine filters these out; reaching here is harmless
                tracing::debug!("⏭️ Chat interface node '{}' has nothing to execute", node.id);
                Ok(())
            }
        };

        match &result {
            Ok(()) => {
                tracker.log(LogLevel::Info, &node.id, "Node completed successfully", None);
                tracing::info!("✅ Node execution completed: {} in {:?}", node.id, start.elapsed());
            }
            Err(e) => {
                tracker.log(LogLevel::Error, &node.id, format!("Node execution failed: {}", e), None);
                tracing::error!("❌ Node execution failed: {} in {:?} - Error: {}", node.id, start.elapsed(), e);
            }
        }

        result
    }

    /// Test the configured connection, then pull its schema into the context
    async fn execute_data_connector(
        &self,
        node: &WorkflowNode,
        config: &ConnectorConfig,
        context: &mut RunContext,
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        let kind = config
            .connection_type
            .ok_or_else(|| anyhow!("connectionType is required for data connector node '{}'", node.id))?;
        let endpoint = config
            .endpoint
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("endpoint is required for data connector node '{}'", node.id))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("apiKey is required for data connector node '{}'", node.id))?;

        let profile = ConnectionProfile {
            kind,
            endpoint,
            api_key,
            database: config.database.clone(),
        };

        let test = self.sources.test_connection(&profile).await?;
        if !test.success {
            bail!("Connection failed: {}", test.message);
        }

        let schema = self.sources.fetch_schema(&profile).await?;
        tracker.log(
            LogLevel::Info,
            &node.id,
            format!("Connected to {}, found {} tables", profile.kind, schema.tables.len()),
            None,
        );

        context.connection = Some(profile);
        context.schema = Some(schema);
        Ok(())
    }

    /// Hand the fetched schema to the language model for analysis
    async fn execute_schema_interpreter(
        &self,
        node: &WorkflowNode,
        config: &InterpreterConfig,
        context: &mut RunContext,
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        let schema = context
            .schema
            .as_ref()
            .ok_or_else(|| anyhow!("No schema available. Connect a data source first."))?;

        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let temperature = config.temperature.unwrap_or(0.7);

        let schema_json = serde_json::to_string_pretty(schema)?;
        let interpretation = self.llm.interpret_schema(&schema_json, model, temperature).await?;

        tracker.log(LogLevel::Info, &node.id, format!("Schema interpreted using {}", model), None);

        context.schema_interpretation = Some(interpretation);
        Ok(())
    }

    /// Build the monitoring query; execute it only when a connection exists
    async fn execute_monitor_builder(
        &self,
        node: &WorkflowNode,
        config: &MonitorConfig,
        context: &mut RunContext,
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        let interpretation = context
            .schema_interpretation
            .clone()
            .ok_or_else(|| anyhow!("No schema interpretation available"))?;
        let condition = config
            .condition
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("condition is required for monitor builder node '{}'", node.id))?;
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let generated = self.llm.generate_monitor_query(&interpretation, condition, model).await?;

        context.monitor_query = Some(generated.query.clone());
        context.monitor_explanation = Some(generated.explanation.clone());

        if let Some(connection) = context.connection.clone() {
            let results = self.sources.execute_query(&connection, &generated.query).await?;

            tracker.log(LogLevel::Info, &node.id, format!("Monitor executed: {}", generated.explanation), None);
            let preview: String = serde_json::to_string(&results)
                .unwrap_or_else(|_| "[]".to_string())
                .chars()
                .take(200)
                .collect();
            tracker.log(LogLevel::Info, &node.id, format!("Results: {}...", preview), None);

            context.monitor_results = Some(results);
        } else {
            // Monitor built but not executed; the run carries on
            tracker.log(
                LogLevel::Info,
                &node.id,
                "Monitor built without an active connection; query not executed",
                None,
            );
        }

        Ok(())
    }

    /// Deliver a notification assembled from whatever the run produced
    async fn execute_action_executor(
        &self,
        node: &WorkflowNode,
        config: &ActionNodeConfig,
        context: &mut RunContext,
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        if config.action_type.is_none() {
            bail!("actionType is required for action executor node '{}'", node.id);
        }

        let payload = json!({
            "condition": context.monitor_query.clone().unwrap_or_else(|| "Unknown condition".to_string()),
            "results": context.monitor_results.clone().unwrap_or_default(),
            "timestamp": Utc::now().to_rfc3339(),
            "workflow": context.workflow_id,
        });

        let outcome = self.actions.execute(config, &payload).await?;
        if !outcome.success {
            bail!(
                "Action failed: {}",
                outcome.error.clone().unwrap_or_else(|| outcome.message.clone())
            );
        }

        tracker.log(LogLevel::Info, &node.id, format!("Action executed: {}", outcome.message), None);

        context.action_result = Some(outcome);
        Ok(())
    }
}
