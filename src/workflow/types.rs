/// Core workflow type definitions
///
/// Defines the fundamental structures for workflows, nodes, and edges. These
/// types are serialized/deserialized from JSON both for persistence and for
/// the execute endpoint, so field names stay camelCase on the wire.

use crate::actions::ActionOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// A complete workflow definition containing nodes and their connections
///
/// Workflows are stored as JSON in SQLite and compiled into petgraph DAGs
/// for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier (e.g., "wf-signup-funnel")
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    /// List of nodes in this workflow
    pub nodes: Vec<WorkflowNode>,
    /// List of edges connecting nodes
    pub edges: Vec<WorkflowEdge>,
}

/// A single node in the workflow DAG
///
/// Nodes represent discrete pipeline stages (connect, interpret, monitor,
/// act). The kind carries the per-stage configuration as a tagged union, so
/// dispatch in the executor is exhaustive rather than driven by open-ended
/// field lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    /// Unique node identifier within the workflow (e.g., "n1", "connector-prod")
    pub id: String,
    /// Human-readable name, used in logs and the execution report
    #[serde(default)]
    pub label: String,
    /// Node kind plus its configuration, serialized as {"type": ..., "config": {...}}
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl WorkflowNode {
    /// Label for logs, falling back to the node id when the builder left it empty
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// The closed set of node kinds the engine understands
///
/// An unrecognized "type" string fails deserialization at the HTTP boundary,
/// which is what makes unknown node types fatal before a run record exists.
/// ChatInterface exists for the builder UI only and never executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "kebab-case")]
pub enum NodeKind {
    /// Connects to a data source, tests the connection, and pulls its schema
    /// Expected config: { "connectionType": "supabase", "endpoint": "...", "apiKey": "..." }
    DataConnector(ConnectorConfig),

    /// Sends the fetched schema to a language model for interpretation
    /// Expected config: { "model": "anthropic/claude-3-sonnet", "temperature": 0.7 }
    SchemaInterpreter(InterpreterConfig),

    /// Generates (and, given a connection, runs) a monitoring query
    /// Expected config: { "condition": "signups drop below 10/day", "cronExpression": "0 0 * * * *" }
    MonitorBuilder(MonitorConfig),

    /// Delivers a notification built from the run's results
    /// Expected config: { "actionType": "slack", "slackWebhook": "https://hooks.slack.com/..." }
    ActionExecutor(ActionNodeConfig),

    /// Chat surface placeholder from the builder UI; filtered out of every run
    ChatInterface,
}

impl NodeKind {
    /// Wire name of the kind, for logs
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::DataConnector(_) => "data-connector",
            NodeKind::SchemaInterpreter(_) => "schema-interpreter",
            NodeKind::MonitorBuilder(_) => "monitor-builder",
            NodeKind::ActionExecutor(_) => "action-executor",
            NodeKind::ChatInterface => "chat-interface",
        }
    }
}

/// Configuration for a data-connector node
///
/// All fields are optional at the wire level; the executor enforces which
/// ones are required and fails the run with a descriptive message otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    pub connection_type: Option<SourceKind>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub database: Option<String>,
}

/// Configuration for a schema-interpreter node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpreterConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// Configuration for a monitor-builder node
///
/// cronExpression is optional; when present the scheduler runs the owning
/// workflow on that cadence in addition to on-demand execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    pub condition: Option<String>,
    pub model: Option<String>,
    pub cron_expression: Option<String>,
}

/// Configuration for an action-executor node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionNodeConfig {
    pub action_type: Option<ActionKind>,
    pub slack_webhook: Option<String>,
    pub email_recipients: Option<String>,
    pub message: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_method: Option<String>,
    pub webhook_headers: Option<HashMap<String, String>>,
    pub webhook_body: Option<Value>,
}

/// Supported data source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Supabase,
    Posthog,
    Bigquery,
    Postgresql,
    Mysql,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Supabase => "supabase",
            SourceKind::Posthog => "posthog",
            SourceKind::Bigquery => "bigquery",
            SourceKind::Postgresql => "postgresql",
            SourceKind::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

/// Notification channels the action sink can deliver to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Slack,
    Email,
    Webhook,
    Hubspot,
    Api,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Slack => "slack",
            ActionKind::Email => "email",
            ActionKind::Webhook => "webhook",
            ActionKind::Hubspot => "hubspot",
            ActionKind::Api => "api",
        };
        f.write_str(name)
    }
}

/// Connection between two nodes in the workflow DAG
///
/// Edges define producer-to-consumer dependencies. The execution engine uses
/// them to build the dependency graph; cycles are rejected before any node runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    /// Builder-assigned edge id, ignored by the engine
    #[serde(default)]
    pub id: String,
    /// Source node ID
    pub source: String,
    /// Target node ID
    pub target: String,
}

/// A resolved data source connection, as handed to the source collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub endpoint: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Introspected structure of a connected data source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSchema {
    pub tables: Vec<SchemaTable>,
    #[serde(default)]
    pub relationships: Vec<SchemaRelationship>,
    #[serde(default)]
    pub entities: Vec<DetectedEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ColumnRef>,
}

/// A (table, column) pair used by foreign keys and relationships
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRelationship {
    pub from: ColumnRef,
    pub to: ColumnRef,
    /// one-to-one, one-to-many, many-to-many
    #[serde(rename = "type")]
    pub kind: String,
}

/// A business entity detected in the schema (users, events, orders, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedEntity {
    pub name: String,
    pub table: String,
    pub description: String,
    pub key_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_fields: Option<Vec<String>>,
}

/// Ephemeral shared state for one workflow run
///
/// A typed blackboard: each handler reads the slots it depends on and fills
/// the slots it produces. Created fresh per run, owned exclusively by that
/// run, and discarded with it; never persisted and never shared across runs.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Workflow definition id this run belongs to
    pub workflow_id: String,
    /// Filled by data-connector
    pub connection: Option<ConnectionProfile>,
    /// Filled by data-connector
    pub schema: Option<DataSchema>,
    /// Filled by schema-interpreter
    pub schema_interpretation: Option<String>,
    /// Filled by monitor-builder
    pub monitor_query: Option<String>,
    /// Filled by monitor-builder
    pub monitor_explanation: Option<String>,
    /// Filled by monitor-builder when a connection is present
    pub monitor_results: Option<Vec<Value>>,
    /// Filled by action-executor
    pub action_result: Option<ActionOutcome>,
}

impl RunContext {
    /// Create a fresh context for a single run
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_deserializes_from_builder_json() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "n1",
            "type": "data-connector",
            "label": "Production DB",
            "config": {
                "connectionType": "supabase",
                "endpoint": "https://example.supabase.co",
                "apiKey": "service-key"
            }
        }))
        .expect("node should parse");

        assert_eq!(node.id, "n1");
        assert_eq!(node.display_label(), "Production DB");
        match node.kind {
            NodeKind::DataConnector(config) => {
                assert_eq!(config.connection_type, Some(SourceKind::Supabase));
                assert_eq!(config.endpoint.as_deref(), Some("https://example.supabase.co"));
                assert!(config.database.is_none());
            }
            other => panic!("expected data-connector, got {}", other.name()),
        }
    }

    #[test]
    fn empty_config_parses_with_all_fields_absent() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "n1",
            "type": "data-connector",
            "config": {}
        }))
        .expect("empty config should parse");

        match node.kind {
            NodeKind::DataConnector(ref config) => {
                assert!(config.connection_type.is_none());
                assert!(config.endpoint.is_none());
                assert!(config.api_key.is_none());
            }
            other => panic!("expected data-connector, got {}", other.name()),
        }
        assert_eq!(node.display_label(), "n1");
    }

    #[test]
    fn chat_interface_parses_without_config() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "chat",
            "type": "chat-interface"
        }))
        .expect("chat-interface should parse without config");
        assert!(matches!(node.kind, NodeKind::ChatInterface));
    }

    #[test]
    fn unknown_node_type_is_rejected() {
        let result: Result<WorkflowNode, _> = serde_json::from_value(json!({
            "id": "n1",
            "type": "spreadsheet-export",
            "config": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn node_serializes_back_to_tagged_shape() {
        let node = WorkflowNode {
            id: "m1".to_string(),
            label: "Signups monitor".to_string(),
            kind: NodeKind::MonitorBuilder(MonitorConfig {
                condition: Some("signups < 10".to_string()),
                model: None,
                cron_expression: Some("0 0 * * * *".to_string()),
            }),
        };

        let value = serde_json::to_value(&node).expect("node should serialize");
        assert_eq!(value["type"], "monitor-builder");
        assert_eq!(value["config"]["condition"], "signups < 10");
        assert_eq!(value["config"]["cronExpression"], "0 0 * * * *");
    }
}
