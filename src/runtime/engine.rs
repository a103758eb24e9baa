/// Petgraph-based workflow execution engine
///
/// Converts a node/edge definition into a directed acyclic graph, orders it
/// topologically, and executes the nodes strictly one at a time. Every run
/// produces a well-formed WorkflowExecution record: validation problems,
/// cycles, and collaborator failures all land there as a failed status
/// instead of surfacing as a raw error to the caller.

use crate::runtime::executor::NodeExecutor;
use crate::workflow::execution::{ExecutionTracker, LogLevel, WorkflowExecution};
use crate::workflow::types::{NodeKind, RunContext, WorkflowEdge, WorkflowNode};
use anyhow::{anyhow, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::{collections::HashMap, sync::Arc};

/// Compute a dependency-correct execution order for the given graph
///
/// Edges naming unknown nodes and cyclic graphs are fatal before any node
/// executes. Orphan nodes participate; no particular order is guaranteed
/// among nodes with no path between them.
pub fn execution_order(nodes: &[WorkflowNode], edges: &[WorkflowEdge]) -> Result<Vec<WorkflowNode>> {
    let mut graph: DiGraph<WorkflowNode, ()> = DiGraph::new();
    let mut id_to_index: HashMap<String, NodeIndex> = HashMap::new();

    for node in nodes {
        let index = graph.add_node(node.clone());
        id_to_index.insert(node.id.clone(), index);
    }

    for edge in edges {
        let source = id_to_index
            .get(&edge.source)
            .ok_or_else(|| anyhow!("Edge references unknown node: {}", edge.source))?;
        let target = id_to_index
            .get(&edge.target)
            .ok_or_else(|| anyhow!("Edge references unknown node: {}", edge.target))?;
        graph.add_edge(*source, *target, ());
    }

    let order = toposort(&graph, None)
        .map_err(|_| anyhow!("workflow contains a cycle and cannot be executed"))?;

    Ok(order.into_iter().map(|index| graph[index].clone()).collect())
}

/// Sequential DAG executor
///
/// Owns the node executor; one engine serves all runs, but each run gets its
/// own tracker and context, so concurrent runs never share state.
pub struct WorkflowEngine {
    executor: Arc<NodeExecutor>,
}

impl WorkflowEngine {
    pub fn new(executor: Arc<NodeExecutor>) -> Self {
        Self { executor }
    }

    /// Run a workflow and return its execution record
    ///
    /// Infallible at the signature level: the record's status tells the
    /// caller whether the run completed or failed, and its logs tell them
    /// where.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        nodes: &[WorkflowNode],
        edges: &[WorkflowEdge],
    ) -> WorkflowExecution {
        let started = std::time::Instant::now();
        let mut tracker = ExecutionTracker::new(workflow_id);
        tracker.begin();

        tracing::info!(
            "🚀 Starting workflow execution: {} ({} nodes, {} edges)",
            workflow_id,
            nodes.len(),
            edges.len()
        );

        match self.run(workflow_id, nodes, edges, &mut tracker).await {
            Ok(()) => {
                tracker.log(LogLevel::Info, "workflow", "Workflow execution completed successfully", None);
                tracker.complete();
                tracing::info!("🎉 Workflow '{}' completed in {:?}", workflow_id, started.elapsed());
            }
            Err(e) => {
                tracker.log(LogLevel::Error, "workflow", format!("Workflow execution failed: {}", e), None);
                tracker.fail(e.to_string());
                tracing::error!(
                    "❌ Workflow '{}' failed after {:?} - Error: {}",
                    workflow_id,
                    started.elapsed(),
                    e
                );
            }
        }

        tracker.into_execution()
    }

    async fn run(
        &self,
        workflow_id: &str,
        nodes: &[WorkflowNode],
        edges: &[WorkflowEdge],
        tracker: &mut ExecutionTracker,
    ) -> Result<()> {
        tracker.log(LogLevel::Info, "workflow", "Workflow execution started", None);

        let order = execution_order(nodes, edges)?;
        let order_line = order
            .iter()
            .map(|node| node.display_label())
            .collect::<Vec<_>>()
            .join(" → ");
        tracker.log(LogLevel::Info, "workflow", format!("Execution order: {}", order_line), None);

        let mut context = RunContext::new(workflow_id);

        for node in &order {
            // Chat surfaces live in the builder canvas only
            if matches!(node.kind, NodeKind::ChatInterface) {
                tracing::debug!("⏭️ Skipping chat interface node '{}' during execution", node.id);
                continue;
            }

            // Fail fast: the first node error ends the run
            self.executor.execute_node(node, &mut context, tracker).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{ConnectorConfig, InterpreterConfig};

    fn node(id: &str) -> WorkflowNode {
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

    fn edge(source: &str, target: &str) -> WorkflowEdge {
        WorkflowEdge {
            id: String::new(),
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn position(order: &[WorkflowNode], id: &str) -> usize {
        order
            .iter()
            .position(|n| n.id == id)
            .unwrap_or_else(|| panic!("node {} missing from order", id))
    }

    #[test]
    fn every_edge_source_precedes_its_target() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("a", "d"), edge("d", "c")];

        let order = execution_order(&nodes, &edges).expect("valid DAG should order");

        assert_eq!(order.len(), 4);
        for e in &edges {
            assert!(
                position(&order, &e.source) < position(&order, &e.target),
                "{} should precede {}",
                e.source,
                e.target
            );
        }
    }

    #[test]
    fn fan_in_sources_both_precede_the_target() {
        let nodes = vec![node("c1"), node("c2"), interpreter("i")];
        let edges = vec![edge("c1", "i"), edge("c2", "i")];

        let order = execution_order(&nodes, &edges).expect("fan-in should order");

        let i = position(&order, "i");
        assert!(position(&order, "c1") < i);
        assert!(position(&order, "c2") < i);
    }

    #[test]
    fn orphan_nodes_are_included() {
        let nodes = vec![node("a"), node("b"), node("island")];
        let edges = vec![edge("a", "b")];

        let order = execution_order(&nodes, &edges).expect("orphans are valid");

        assert_eq!(order.len(), 3);
        assert!(order.iter().any(|n| n.id == "island"));
    }

    #[test]
    fn cycles_are_rejected() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("a", "b"), edge("b", "a")];

        let error = execution_order(&nodes, &edges).expect_err("cycle must fail");
        assert!(error.to_string().contains("cycle"));
    }

    #[test]
    fn edges_to_unknown_nodes_are_rejected() {
        let nodes = vec![node("a")];
        let edges = vec![edge("a", "ghost")];

        let error = execution_order(&nodes, &edges).expect_err("unknown target must fail");
        assert!(error.to_string().contains("ghost"));
    }

    #[test]
    fn empty_graph_orders_to_nothing() {
        let order = execution_order(&[], &[]).expect("empty graph is valid");
        assert!(order.is_empty());
    }
}
