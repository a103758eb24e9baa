/// Background monitor scheduler
///
/// Monitor-builder nodes may carry a cron expression; this service runs the
/// owning workflow on that cadence through the same engine the execute
/// endpoint uses. Schedule changes hot-reload with a job-uuid map, so
/// updating one workflow never disturbs the others.

use crate::runtime::engine::WorkflowEngine;
use crate::workflow::execution::ExecutionStatus;
use crate::workflow::registry::{CompiledWorkflow, WorkflowRegistry};
use anyhow::Result;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Hot-reload cron scheduler for monitor workflows
pub struct MonitorSchedulerService {
    scheduler: Arc<RwLock<JobScheduler>>,
    /// Job UUIDs keyed by "workflow_id:node_id", for precise removal
    job_uuid_map: Arc<RwLock<HashMap<String, Uuid>>>,
    registry: Arc<WorkflowRegistry>,
    engine: Arc<WorkflowEngine>,
}

impl MonitorSchedulerService {
    pub async fn new(registry: Arc<WorkflowRegistry>, engine: Arc<WorkflowEngine>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            job_uuid_map: Arc::new(RwLock::new(HashMap::new())),
            registry,
            engine,
        })
    }

    /// Register all scheduled monitors from the registry and start ticking
    pub async fn start(&self) -> Result<()> {
        tracing::info!("⏰ Starting monitor scheduler service");

        self.register_all_monitor_schedules().await?;

        {
            let scheduler = self.scheduler.read().await;
            scheduler.start().await?;
        }

        tracing::info!("✅ Monitor scheduler started successfully");
        Ok(())
    }

    /// Stop the scheduler and forget all tracked jobs
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping monitor scheduler service");

        {
            let mut job_uuid_map = self.job_uuid_map.write().await;
            job_uuid_map.clear();
        }

        {
            let mut scheduler = self.scheduler.write().await;
            scheduler.shutdown().await?;
        }

        tracing::info!("✅ Monitor scheduler stopped");
        Ok(())
    }

    /// Add or replace the cron jobs for one workflow (zero-downtime)
    pub async fn add_or_update_workflow_schedules(&self, compiled: &CompiledWorkflow) -> Result<()> {
        let workflow_id = &compiled.workflow.id;
        tracing::info!("🔥 Hot-reloading monitor schedules for workflow: {}", workflow_id);

        if compiled.monitor_schedules.is_empty() {
            tracing::debug!("📋 No scheduled monitors in workflow: {}", workflow_id);
            self.remove_workflow_schedules(workflow_id).await;
            return Ok(());
        }

        for schedule in &compiled.monitor_schedules {
            self.add_or_update_monitor_job(workflow_id, &schedule.node_id, &schedule.schedule)
                .await?;
        }

        tracing::info!(
            "🔥 Hot-reloaded {} monitor schedules for workflow: {}",
            compiled.monitor_schedules.len(),
            workflow_id
        );
        Ok(())
    }

    /// Remove every cron job belonging to a workflow
    pub async fn remove_workflow_schedules(&self, workflow_id: &str) {
        tracing::info!("🗑️ Removing monitor schedules for workflow: {}", workflow_id);

        let mut job_uuid_map = self.job_uuid_map.write().await;
        let keys_to_remove: Vec<String> = job_uuid_map
            .keys()
            .filter(|key| key.starts_with(&format!("{}:", workflow_id)))
            .cloned()
            .collect();

        for key in keys_to_remove {
            if let Some(job_uuid) = job_uuid_map.remove(&key) {
                let scheduler = self.scheduler.read().await;
                if let Err(e) = scheduler.remove(&job_uuid).await {
                    tracing::warn!("⚠️ Failed to remove job {} from scheduler: {}", key, e);
                } else {
                    tracing::debug!("🛑 Removed monitor job from scheduler: {}", key);
                }
            }
        }
    }

    /// Core add/update for one monitor job
    async fn add_or_update_monitor_job(&self, workflow_id: &str, node_id: &str, schedule: &str) -> Result<()> {
        let job_id = format!("{}:{}", workflow_id, node_id);

        tracing::info!("⏰ Registering monitor job: {} - schedule: {}", job_id, schedule);

        // Drop the previous job for this monitor before adding the new one
        {
            let mut job_uuid_map = self.job_uuid_map.write().await;
            if let Some(old_job_uuid) = job_uuid_map.remove(&job_id) {
                let scheduler = self.scheduler.read().await;
                if let Err(e) = scheduler.remove(&old_job_uuid).await {
                    tracing::warn!("⚠️ Failed to remove old job {} from scheduler: {}", job_id, e);
                } else {
                    tracing::debug!("🛑 Removed old monitor job from scheduler: {}", job_id);
                }
            }
        }

        let workflow_id_owned = workflow_id.to_string();
        let node_id_owned = node_id.to_string();
        let registry = Arc::clone(&self.registry);
        let engine = Arc::clone(&self.engine);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let workflow_id = workflow_id_owned.clone();
            let node_id = node_id_owned.clone();
            let registry = Arc::clone(&registry);
            let engine = Arc::clone(&engine);

            Box::pin(async move {
                tracing::debug!("🔔 Monitor schedule fired: {} in workflow {}", node_id, workflow_id);

                // Deleted workflows skip gracefully; no restart required
                if let Some(compiled) = registry.get_workflow(&workflow_id) {
                    tracing::info!("🚀 Executing scheduled monitor workflow: {}", workflow_id);

                    let execution = engine
                        .execute_workflow(&workflow_id, &compiled.workflow.nodes, &compiled.workflow.edges)
                        .await;

                    match execution.status {
                        ExecutionStatus::Completed => {
                            tracing::info!(
                                "✅ Scheduled workflow completed: {} ({} log entries)",
                                workflow_id,
                                execution.logs.len()
                            );
                        }
                        _ => {
                            tracing::error!(
                                "❌ Scheduled workflow failed: {} - Error: {}",
                                workflow_id,
                                execution.error.as_deref().unwrap_or("unknown")
                            );
                        }
                    }
                } else {
                    tracing::debug!("⏭️ Skipping schedule for deleted workflow: {}", workflow_id);
                }
            })
        })?;

        let new_job_uuid = {
            let scheduler = self.scheduler.write().await;
            scheduler.add(job).await?
        };

        {
            let mut job_uuid_map = self.job_uuid_map.write().await;
            job_uuid_map.insert(job_id.clone(), new_job_uuid);
        }

        tracing::info!("🔥 Monitor job active: {} ({})", job_id, schedule);
        Ok(())
    }

    /// Register every scheduled monitor currently in the registry (startup only)
    async fn register_all_monitor_schedules(&self) -> Result<()> {
        let workflows = self.registry.get_all_workflows();
        let workflow_count = workflows.len();
        let mut total_schedules = 0;

        for compiled in workflows {
            if !compiled.monitor_schedules.is_empty() {
                total_schedules += compiled.monitor_schedules.len();
                self.add_or_update_workflow_schedules(&compiled).await?;
            }
        }

        tracing::info!(
            "📊 Registered {} monitor schedules from {} workflows",
            total_schedules,
            workflow_count
        );
        Ok(())
    }
}
