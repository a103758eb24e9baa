/// Workflow execution records and the tracker that owns them
///
/// A WorkflowExecution is the caller-visible result of one run: status,
/// timestamps, terminal error, and the append-only structured log that serves
/// as the audit trail. The ExecutionTracker enforces the status state machine
/// (pending -> running -> completed | failed, never out of a terminal state)
/// and is the only writer of log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Completed and failed are final; no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One immutable entry in a run's audit trail
///
/// Entries are appended in chronological order and never mutated or removed;
/// insertion order is semantically meaningful to the execution report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    /// Unique per run, generated at creation
    pub id: String,
    /// Caller-supplied id of the workflow definition being run
    pub workflow_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Present only when status is failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<ExecutionLog>,
}

/// Owns one WorkflowExecution for the duration of a run
#[derive(Debug)]
pub struct ExecutionTracker {
    execution: WorkflowExecution,
}

impl ExecutionTracker {
    /// Open a pending execution record for the given workflow
    pub fn new(workflow_id: &str) -> Self {
        Self {
            execution: WorkflowExecution {
                id: format!("exec-{}", Uuid::new_v4()),
                workflow_id: workflow_id.to_string(),
                status: ExecutionStatus::Pending,
                started_at: Utc::now(),
                completed_at: None,
                error: None,
                logs: Vec::new(),
            },
        }
    }

    /// Transition pending -> running; called before ordering or logging begins
    pub fn begin(&mut self) {
        if self.execution.status == ExecutionStatus::Pending {
            self.execution.status = ExecutionStatus::Running;
            self.execution.started_at = Utc::now();
        }
    }

    /// Append one log entry with a capture-time timestamp
    ///
    /// Entries are mirrored to tracing so server logs and the execution
    /// report tell the same story.
    pub fn log(&mut self, level: LogLevel, node_id: &str, message: impl Into<String>, data: Option<Value>) {
        let message = message.into();
        match level {
            LogLevel::Info => tracing::info!("📝 [{}] {}", node_id, message),
            LogLevel::Warn => tracing::warn!("📝 [{}] {}", node_id, message),
            LogLevel::Error => tracing::error!("📝 [{}] {}", node_id, message),
        }
        self.execution.logs.push(ExecutionLog {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
            level,
            message,
            data,
        });
    }

    /// Transition running -> completed; a no-op once terminal
    pub fn complete(&mut self) {
        if self.execution.status.is_terminal() {
            return;
        }
        self.execution.status = ExecutionStatus::Completed;
        self.execution.completed_at = Some(Utc::now());
    }

    /// Transition running -> failed with the triggering error; a no-op once terminal
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.execution.status.is_terminal() {
            return;
        }
        self.execution.status = ExecutionStatus::Failed;
        self.execution.error = Some(error.into());
        self.execution.completed_at = Some(Utc::now());
    }

    pub fn status(&self) -> ExecutionStatus {
        self.execution.status
    }

    pub fn execution(&self) -> &WorkflowExecution {
        &self.execution
    }

    /// Hand the finished record back to the caller
    pub fn into_execution(self) -> WorkflowExecution {
        self.execution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_transitions_are_monotonic() {
        let mut tracker = ExecutionTracker::new("wf-1");
        assert_eq!(tracker.status(), ExecutionStatus::Pending);

        tracker.begin();
        assert_eq!(tracker.status(), ExecutionStatus::Running);
        assert!(tracker.execution().completed_at.is_none());

        tracker.complete();
        assert_eq!(tracker.status(), ExecutionStatus::Completed);
        assert!(tracker.execution().completed_at.is_some());

        // Terminal states never change again
        tracker.fail("late failure");
        assert_eq!(tracker.status(), ExecutionStatus::Completed);
        assert!(tracker.execution().error.is_none());
    }

    #[test]
    fn failure_records_error_and_stays_failed() {
        let mut tracker = ExecutionTracker::new("wf-1");
        tracker.begin();
        tracker.fail("endpoint is required");

        assert_eq!(tracker.status(), ExecutionStatus::Failed);
        assert_eq!(tracker.execution().error.as_deref(), Some("endpoint is required"));

        tracker.complete();
        assert_eq!(tracker.status(), ExecutionStatus::Failed);
    }

    #[test]
    fn logs_are_appended_in_order() {
        let mut tracker = ExecutionTracker::new("wf-1");
        tracker.begin();
        tracker.log(LogLevel::Info, "workflow", "Workflow execution started", None);
        tracker.log(LogLevel::Info, "n1", "Executing node: connector", None);
        tracker.log(LogLevel::Error, "n1", "Node execution failed: apiKey is required", None);

        let logs = &tracker.execution().logs;
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].node_id, "workflow");
        assert_eq!(logs[1].node_id, "n1");
        assert_eq!(logs[2].level, LogLevel::Error);
        assert!(logs[0].timestamp <= logs[2].timestamp);
    }

    #[test]
    fn execution_serializes_with_camel_case_contract() {
        let mut tracker = ExecutionTracker::new("wf-growth");
        tracker.begin();
        tracker.log(
            LogLevel::Info,
            "n1",
            "Connected to supabase, found 3 tables",
            Some(json!({"tables": 3})),
        );
        tracker.complete();

        let value = serde_json::to_value(tracker.execution()).expect("record should serialize");
        assert_eq!(value["workflowId"], "wf-growth");
        assert_eq!(value["status"], "completed");
        assert!(value["startedAt"].is_string());
        assert!(value["completedAt"].is_string());
        assert!(value.get("error").is_none());
        assert_eq!(value["logs"][0]["nodeId"], "n1");
        assert_eq!(value["logs"][0]["level"], "info");
        assert_eq!(value["logs"][0]["data"]["tables"], 3);
    }
}
