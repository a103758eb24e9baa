/// Hot-reload workflow registry using ArcSwap
///
/// Provides lock-free, atomic updates to the in-memory workflow registry.
/// Each workflow update swaps the entire registry pointer, so scheduler
/// firings and lookups continue uninterrupted while definitions change.

use crate::runtime::engine::execution_order;
use crate::workflow::{storage::WorkflowStorage, types::{NodeKind, Workflow}};
use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

/// Lock-free registry of compiled workflows
///
/// The registry is the single source of truth for active workflows in
/// memory; storage is only consulted on reloads.
#[derive(Debug)]
pub struct WorkflowRegistry {
    /// Thread-safe atomic pointer to the workflow map
    /// Key: workflow_id, Value: compiled workflow definition
    workflows: ArcSwap<HashMap<String, CompiledWorkflow>>,

    /// Reference to persistent storage for reload operations
    storage: WorkflowStorage,
}

/// Compiled workflow with execution metadata
///
/// Compilation validates the graph (unknown edge endpoints, cycles) so bad
/// definitions are rejected at save time rather than on first run, and
/// extracts the monitor schedules the cron service registers.
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    /// Base workflow definition
    pub workflow: Workflow,

    /// Cron schedules harvested from monitor-builder nodes
    pub monitor_schedules: Vec<MonitorSchedule>,
}

/// One scheduled monitor inside a workflow
#[derive(Debug, Clone)]
pub struct MonitorSchedule {
    pub node_id: String,
    pub schedule: String,
}

impl WorkflowRegistry {
    /// Create new registry instance with storage backend
    pub fn new(storage: WorkflowStorage) -> Self {
        Self {
            workflows: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Initialize registry by loading all workflows from storage
    pub async fn init_from_storage(&self) -> Result<()> {
        let stored_workflows = self.storage.load_all_workflows().await?;
        let compiled_workflows = compile_workflows(stored_workflows)?;

        // Atomic swap of the entire registry
        self.workflows.store(Arc::new(compiled_workflows));

        tracing::info!("📊 Initialized workflow registry with {} workflows", self.workflows.load().len());

        Ok(())
    }

    /// Hot-reload a single workflow after a create or update
    ///
    /// Lock-free: clones the current map, updates it, and swaps the pointer.
    pub async fn reload_workflow(&self, workflow_id: &str) -> Result<()> {
        let workflow = self
            .storage
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| anyhow!("Workflow not found: {}", workflow_id))?;

        let compiled = compile_single_workflow(workflow)?;

        let current = self.workflows.load();
        let mut new_registry = (**current).clone();
        new_registry.insert(workflow_id.to_string(), compiled);

        self.workflows.store(Arc::new(new_registry));

        tracing::info!("🔥 Hot-reloaded workflow: {}", workflow_id);

        Ok(())
    }

    /// Get a workflow by ID (lock-free read)
    pub fn get_workflow(&self, workflow_id: &str) -> Option<CompiledWorkflow> {
        self.workflows.load().get(workflow_id).cloned()
    }

    /// All compiled workflows, for scheduler startup
    pub fn get_all_workflows(&self) -> Vec<CompiledWorkflow> {
        self.workflows.load().values().cloned().collect()
    }

    /// List all active workflow IDs
    pub fn list_workflow_ids(&self) -> Vec<String> {
        self.workflows.load().keys().cloned().collect()
    }

    /// Remove a workflow from the registry
    pub async fn remove_workflow(&self, workflow_id: &str) -> Result<()> {
        let current = self.workflows.load();
        let mut new_registry = (**current).clone();

        if new_registry.remove(workflow_id).is_some() {
            self.workflows.store(Arc::new(new_registry));
            tracing::info!("🗑️ Removed workflow from registry: {}", workflow_id);
        }

        Ok(())
    }
}

/// Compile multiple workflows into execution-ready form
fn compile_workflows(workflows: HashMap<String, Workflow>) -> Result<HashMap<String, CompiledWorkflow>> {
    let mut compiled = HashMap::new();

    for (id, workflow) in workflows {
        let compiled_workflow = compile_single_workflow(workflow)?;
        compiled.insert(id, compiled_workflow);
    }

    Ok(compiled)
}

/// Validate a workflow's graph and extract its monitor schedules
pub fn compile_single_workflow(workflow: Workflow) -> Result<CompiledWorkflow> {
    // Surfaces unknown edge endpoints and cycles before the definition is usable
    execution_order(&workflow.nodes, &workflow.edges)
        .map_err(|e| anyhow!("Workflow '{}' is invalid: {}", workflow.id, e))?;

    let mut monitor_schedules = Vec::new();
    for node in &workflow.nodes {
        if let NodeKind::MonitorBuilder(config) = &node.kind {
            if let Some(schedule) = config.cron_expression.as_deref().filter(|s| !s.is_empty()) {
                monitor_schedules.push(MonitorSchedule {
                    node_id: node.id.clone(),
                    schedule: schedule.to_string(),
                });
            }
        }
    }

    Ok(CompiledWorkflow {
        workflow,
        monitor_schedules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{MonitorConfig, WorkflowEdge, WorkflowNode};

    fn monitor_node(id: &str, cron: Option<&str>) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            label: String::new(),
            kind: NodeKind::MonitorBuilder(MonitorConfig {
                condition: Some("signups < 10".to_string()),
                model: None,
                cron_expression: cron.map(|c| c.to_string()),
            }),
        }
    }

    #[test]
    fn compile_extracts_monitor_schedules() {
        let workflow = Workflow {
            id: "wf-1".to_string(),
            name: "Signups".to_string(),
            nodes: vec![monitor_node("m1", Some("0 0 * * * *")), monitor_node("m2", None)],
            edges: vec![],
        };

        let compiled = compile_single_workflow(workflow).expect("valid workflow compiles");
        assert_eq!(compiled.monitor_schedules.len(), 1);
        assert_eq!(compiled.monitor_schedules[0].node_id, "m1");
        assert_eq!(compiled.monitor_schedules[0].schedule, "0 0 * * * *");
    }

    #[test]
    fn compile_rejects_cyclic_definitions() {
        let workflow = Workflow {
            id: "wf-loop".to_string(),
            name: "Loop".to_string(),
            nodes: vec![monitor_node("a", None), monitor_node("b", None)],
            edges: vec![
                WorkflowEdge { id: String::new(), source: "a".to_string(), target: "b".to_string() },
                WorkflowEdge { id: String::new(), source: "b".to_string(), target: "a".to_string() },
            ],
        };

        let error = compile_single_workflow(workflow).expect_err("cycle must be rejected");
        assert!(error.to_string().contains("cycle"));
    }
}
