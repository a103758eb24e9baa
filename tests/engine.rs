/// End-to-end engine tests with mock collaborators
///
/// The engine takes its data source, language model, and action sink as
/// injected trait objects, so every scenario here runs the real ordering,
/// dispatch, and tracking code against in-memory doubles.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use signalway::actions::{ActionOutcome, ActionSink};
use signalway::llm::{GeneratedQuery, LanguageModel, SqlAnswer};
use signalway::runtime::{NodeExecutor, WorkflowEngine};
use signalway::sources::{ConnectionTest, DataSource};
use signalway::workflow::execution::{ExecutionStatus, ExecutionTracker, WorkflowExecution};
use signalway::workflow::types::{
    ActionKind, ActionNodeConfig, ConnectionProfile, ConnectorConfig, DataSchema,
    InterpreterConfig, MonitorConfig, NodeKind, RunContext, SchemaColumn, SchemaTable,
    SourceKind, WorkflowEdge, WorkflowNode,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockSource {
    fail_connection: bool,
    connection_tests: Mutex<usize>,
    executed_queries: Mutex<Vec<String>>,
}

#[async_trait]
impl DataSource for MockSource {
    async fn test_connection(&self, _profile: &ConnectionProfile) -> Result<ConnectionTest> {
        *self.connection_tests.lock().unwrap() += 1;
        Ok(if self.fail_connection {
            ConnectionTest {
                success: false,
                message: "connection refused".to_string(),
                connection_time: None,
            }
        } else {
            ConnectionTest {
                success: true,
                message: "Successfully connected".to_string(),
                connection_time: Some(12),
            }
        })
    }

    async fn fetch_schema(&self, _profile: &ConnectionProfile) -> Result<DataSchema> {
        Ok(DataSchema {
            tables: vec![SchemaTable {
                name: "users".to_string(),
                columns: vec![SchemaColumn {
                    name: "id".to_string(),
                    data_type: "uuid".to_string(),
                    nullable: false,
                    primary_key: Some(true),
                    foreign_key: None,
                }],
                row_count: None,
            }],
            relationships: Vec::new(),
            entities: Vec::new(),
        })
    }

    async fn execute_query(&self, _profile: &ConnectionProfile, query: &str) -> Result<Vec<Value>> {
        self.executed_queries.lock().unwrap().push(query.to_string());
        Ok(vec![json!({ "count": 3 })])
    }
}

#[derive(Default)]
struct MockLlm {
    fail_interpret: bool,
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn interpret_schema(&self, _schema_json: &str, _model: &str, _temperature: f64) -> Result<String> {
        if self.fail_interpret {
            return Err(anyhow!("OpenRouter API error: rate limited"));
        }
        Ok("The users table tracks signups; monitor daily counts.".to_string())
    }

    async fn generate_monitor_query(
        &self,
        _entity_description: &str,
        condition: &str,
        _model: &str,
    ) -> Result<GeneratedQuery> {
        Ok(GeneratedQuery {
            query: format!("SELECT count(*) FROM users -- {}", condition),
            explanation: "Counts users matching the condition".to_string(),
        })
    }

    async fn generate_alert_message(&self, template: &str, _data: &Value, _model: &str) -> Result<String> {
        Ok(template.to_string())
    }

    async fn answer_question(&self, _question: &str, _context: &str, _schema_context: &str) -> Result<SqlAnswer> {
        Ok(SqlAnswer {
            sql: "SELECT 1".to_string(),
            explanation: "trivial".to_string(),
            chart_type: "table".to_string(),
        })
    }

    async fn suggest_follow_ups(&self, _question: &str, _summary: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct MockSink {
    fail: bool,
    deliveries: Mutex<Vec<Value>>,
}

#[async_trait]
impl ActionSink for MockSink {
    async fn execute(&self, _config: &ActionNodeConfig, payload: &Value) -> Result<ActionOutcome> {
        self.deliveries.lock().unwrap().push(payload.clone());
        Ok(if self.fail {
            ActionOutcome {
                success: false,
                message: "delivery failed".to_string(),
                timestamp: Utc::now(),
                error: Some("channel unreachable".to_string()),
            }
        } else {
            ActionOutcome {
                success: true,
                message: "Webhook triggered successfully (200)".to_string(),
                timestamp: Utc::now(),
                error: None,
            }
        })
    }
}

fn engine_with(source: Arc<MockSource>, llm: Arc<MockLlm>, sink: Arc<MockSink>) -> WorkflowEngine {
    WorkflowEngine::new(Arc::new(NodeExecutor::new(source, llm, sink)))
}

fn connector(id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::DataConnector(ConnectorConfig {
            connection_type: Some(SourceKind::Supabase),
            endpoint: Some("https://example.supabase.co".to_string()),
            api_key: Some("service-key".to_string()),
            database: None,
        }),
    }
}

fn unconfigured_connector(id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::DataConnector(ConnectorConfig::default()),
    }
}

fn interpreter(id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::SchemaInterpreter(InterpreterConfig::default()),
    }
}

fn monitor(id: &str, condition: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::MonitorBuilder(MonitorConfig {
            condition: Some(condition.to_string()),
            model: None,
            cron_expression: None,
        }),
    }
}

fn webhook_action(id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::ActionExecutor(ActionNodeConfig {
            action_type: Some(ActionKind::Webhook),
            webhook_url: Some("https://example.com/hook".to_string()),
            ..Default::default()
        }),
    }
}

fn chat(id: &str) -> WorkflowNode {
    WorkflowNode {
        id: id.to_string(),
        label: String::new(),
        kind: NodeKind::ChatInterface,
    }
}

fn edge(source: &str, target: &str) -> WorkflowEdge {
    WorkflowEdge {
        id: String::new(),
        source: source.to_string(),
        target: target.to_string(),
    }
}

fn chain() -> (Vec<WorkflowNode>, Vec<WorkflowEdge>) {
    (
        vec![
            connector("c1"),
            interpreter("i1"),
            monitor("m1", "signups > 5"),
            webhook_action("a1"),
        ],
        vec![edge("c1", "i1"), edge("i1", "m1"), edge("m1", "a1")],
    )
}

/// Count of log entries attributed to one node
fn log_count(execution: &WorkflowExecution, node_id: &str) -> usize {
    execution.logs.iter().filter(|l| l.node_id == node_id).count()
}

/// Index of the "Executing node" entry for one node, as an order witness
fn exec_index(execution: &WorkflowExecution, node_id: &str) -> usize {
    execution
        .logs
        .iter()
        .position(|l| l.node_id == node_id && l.message.starts_with("Executing node"))
        .unwrap_or_else(|| panic!("node {} never started", node_id))
}

#[tokio::test]
async fn linear_workflow_completes_with_full_audit_trail() {
    let source = Arc::new(MockSource::default());
    let sink = Arc::new(MockSink::default());
    let engine = engine_with(Arc::clone(&source), Arc::new(MockLlm::default()), Arc::clone(&sink));

    let (nodes, edges) = chain();
    let execution = engine.execute_workflow("wf-linear", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.workflow_id, "wf-linear");
    assert!(execution.error.is_none());
    assert!(execution.completed_at.is_some());

    // Run start, chosen order, and at least one entry per node
    assert!(execution.logs.iter().any(|l| l.message == "Workflow execution started"));
    assert!(execution.logs.iter().any(|l| l.message.starts_with("Execution order:")));
    for id in ["c1", "i1", "m1", "a1"] {
        assert!(log_count(&execution, id) >= 1, "no logs for node {}", id);
    }
    assert_eq!(
        execution.logs.last().map(|l| l.message.as_str()),
        Some("Workflow execution completed successfully")
    );

    // The monitor ran its generated query and the action was delivered
    let queries = source.executed_queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("signups > 5"));

    let deliveries = sink.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["workflow"], "wf-linear");
    assert_eq!(deliveries[0]["condition"], queries[0].as_str());
}

#[tokio::test]
async fn missing_connector_config_fails_before_later_nodes() {
    let source = Arc::new(MockSource::default());
    let engine = engine_with(Arc::clone(&source), Arc::new(MockLlm::default()), Arc::new(MockSink::default()));

    let (mut nodes, edges) = chain();
    nodes[0] = unconfigured_connector("c1");

    let execution = engine.execute_workflow("wf-unconfigured", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.as_deref().unwrap_or("").contains("required"));

    // The connector logged its start and failure; nothing after it ran
    assert!(log_count(&execution, "c1") >= 1);
    for id in ["i1", "m1", "a1"] {
        assert_eq!(log_count(&execution, id), 0, "node {} should never have run", id);
    }
    assert_eq!(*source.connection_tests.lock().unwrap(), 0);
}

#[tokio::test]
async fn collaborator_failure_halts_the_run() {
    let source = Arc::new(MockSource::default());
    let sink = Arc::new(MockSink::default());
    let llm = Arc::new(MockLlm { fail_interpret: true });
    let engine = engine_with(Arc::clone(&source), llm, Arc::clone(&sink));

    let (nodes, edges) = chain();
    let execution = engine.execute_workflow("wf-llm-down", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.as_deref().unwrap_or("").contains("rate limited"));

    // The connector ran, the interpreter failed, and the tail never executed
    assert!(log_count(&execution, "c1") >= 1);
    assert!(log_count(&execution, "i1") >= 1);
    assert_eq!(log_count(&execution, "m1"), 0);
    assert_eq!(log_count(&execution, "a1"), 0);
    assert!(sink.deliveries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cyclic_workflow_fails_before_any_node_executes() {
    let source = Arc::new(MockSource::default());
    let engine = engine_with(Arc::clone(&source), Arc::new(MockLlm::default()), Arc::new(MockSink::default()));

    let nodes = vec![connector("a"), interpreter("b")];
    let edges = vec![edge("a", "b"), edge("b", "a")];

    let execution = engine.execute_workflow("wf-cycle", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.as_deref().unwrap_or("").contains("cycle"));
    assert!(!execution.logs.iter().any(|l| l.message.starts_with("Executing node")));
    assert_eq!(*source.connection_tests.lock().unwrap(), 0);
}

#[tokio::test]
async fn fan_in_connectors_both_precede_the_interpreter() {
    let engine = engine_with(
        Arc::new(MockSource::default()),
        Arc::new(MockLlm::default()),
        Arc::new(MockSink::default()),
    );

    let nodes = vec![connector("c1"), connector("c2"), interpreter("i1")];
    let edges = vec![edge("c1", "i1"), edge("c2", "i1")];

    let execution = engine.execute_workflow("wf-fan-in", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let i = exec_index(&execution, "i1");
    assert!(exec_index(&execution, "c1") < i);
    assert!(exec_index(&execution, "c2") < i);
}

#[tokio::test]
async fn disconnected_node_participates_independently() {
    let engine = engine_with(
        Arc::new(MockSource::default()),
        Arc::new(MockLlm::default()),
        Arc::new(MockSink::default()),
    );

    let (mut nodes, edges) = chain();
    nodes.push(connector("island"));

    let execution = engine.execute_workflow("wf-island", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(log_count(&execution, "island") >= 1);
}

#[tokio::test]
async fn chat_interface_nodes_are_skipped() {
    let engine = engine_with(
        Arc::new(MockSource::default()),
        Arc::new(MockLlm::default()),
        Arc::new(MockSink::default()),
    );

    let (mut nodes, mut edges) = chain();
    nodes.push(chat("chat1"));
    edges.push(edge("m1", "chat1"));

    let execution = engine.execute_workflow("wf-chat", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(log_count(&execution, "chat1"), 0);
}

#[tokio::test]
async fn action_sink_failure_fails_the_run() {
    let sink = Arc::new(MockSink { fail: true, ..Default::default() });
    let engine = engine_with(Arc::new(MockSource::default()), Arc::new(MockLlm::default()), Arc::clone(&sink));

    let (nodes, edges) = chain();
    let execution = engine.execute_workflow("wf-sink-down", &nodes, &edges).await;

    assert_eq!(execution.status, ExecutionStatus::Failed);
    let error = execution.error.as_deref().unwrap_or("");
    assert!(error.contains("Action failed"));
    assert!(error.contains("channel unreachable"));
}

#[tokio::test]
async fn monitor_without_connection_builds_but_does_not_execute() {
    let source = Arc::new(MockSource::default());
    let executor = NodeExecutor::new(
        Arc::clone(&source) as Arc<dyn DataSource>,
        Arc::new(MockLlm::default()),
        Arc::new(MockSink::default()),
    );

    let mut context = RunContext::new("wf-direct");
    context.schema_interpretation = Some("Users table tracks signups".to_string());
    let mut tracker = ExecutionTracker::new("wf-direct");
    tracker.begin();

    let node = monitor("m1", "signups > 5");
    executor
        .execute_node(&node, &mut context, &mut tracker)
        .await
        .expect("monitor without a connection is not a failure");

    assert!(context.monitor_query.as_deref().unwrap_or("").contains("signups > 5"));
    assert!(context.monitor_results.is_none());
    assert!(source.executed_queries.lock().unwrap().is_empty());
    assert!(tracker
        .execution()
        .logs
        .iter()
        .any(|l| l.message.contains("query not executed")));
}

#[tokio::test]
async fn repeated_runs_yield_identical_behavior() {
    let source = Arc::new(MockSource::default());
    let sink = Arc::new(MockSink::default());
    let engine = engine_with(Arc::clone(&source), Arc::new(MockLlm::default()), Arc::clone(&sink));

    let (nodes, edges) = chain();
    let first = engine.execute_workflow("wf-repeat", &nodes, &edges).await;
    let second = engine.execute_workflow("wf-repeat", &nodes, &edges).await;

    assert_eq!(first.status, ExecutionStatus::Completed);
    assert_eq!(second.status, ExecutionStatus::Completed);
    assert_ne!(first.id, second.id);

    // No state bleeds between runs: same log sequence, one delivery each
    let first_messages: Vec<&str> = first.logs.iter().map(|l| l.message.as_str()).collect();
    let second_messages: Vec<&str> = second.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(first_messages, second_messages);
    assert_eq!(sink.deliveries.lock().unwrap().len(), 2);
    assert_eq!(source.executed_queries.lock().unwrap().len(), 2);
}
