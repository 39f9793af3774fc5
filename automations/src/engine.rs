// Workflow Engine - trigger matching and workflow orchestration

use std::sync::Arc;

use bookline_shared::Booking;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::context::{ContextBuilder, ExecutionContext};
use crate::error::EngineError;
use crate::executor::{ExecutionResult, StepExecutor};
use crate::registry::ActionRegistry;
use crate::store::WorkflowStore;
use crate::triggers::TriggerType;

/// One action invocation within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub action_id: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Inactive,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// A tenant-owned automation: a trigger type plus an ordered list of steps.
///
/// Step order is significant; the engine executes against the snapshot it
/// loaded, so a concurrent definition update never affects a run already
/// in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    /// Optional event filter: each key is a dotted context path that must
    /// equal the configured value for the workflow to run.
    pub trigger_config: Option<Value>,
    pub steps: Vec<WorkflowStep>,
    pub status: WorkflowStatus,
    pub deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowDefinition {
    pub fn new(
        organization_id: Uuid,
        name: &str,
        trigger_type: TriggerType,
        steps: Vec<WorkflowStep>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            description: None,
            trigger_type,
            trigger_config: None,
            steps,
            status: WorkflowStatus::Active,
            deleted: false,
            created_by: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_trigger_config(mut self, config: Value) -> Self {
        self.trigger_config = Some(config);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Durable record of one workflow run.
///
/// Persisted as `running` before the first step executes so in-flight runs
/// are observable, then finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Context snapshot, stored for audit and replay.
    pub context: ExecutionContext,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub step_results: Vec<crate::executor::StepResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn started(workflow_id: Uuid, context: ExecutionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            context,
            status: ExecutionStatus::Running,
            error: None,
            step_results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn finish_completed(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn finish_failed(&mut self, message: &str) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(message.to_string());
        self.completed_at = Some(Utc::now());
    }
}

/// Orchestrates trigger matching, context building and step execution.
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    executor: StepExecutor,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, registry: Arc<ActionRegistry>) -> Self {
        Self::with_config(store, registry, AutomationConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn WorkflowStore>,
        registry: Arc<ActionRegistry>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            store,
            executor: StepExecutor::new(registry, config.retry),
        }
    }

    /// Entry point for trigger producers: run every enabled workflow
    /// registered for this trigger within the booking's organization.
    ///
    /// Workflows are isolated from each other; one workflow's failure is
    /// captured in its own result and never blocks a sibling. An error
    /// here means the lookup itself failed, which would affect every
    /// match equally.
    pub async fn execute_for_trigger(
        &self,
        trigger: &TriggerType,
        booking: &Booking,
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        let organization_id = booking.organization_id();
        let workflows = self.store.find_active(trigger, organization_id).await?;

        if workflows.is_empty() {
            debug!(%trigger, %organization_id, "no active workflows for trigger");
            return Ok(Vec::new());
        }

        info!(
            %trigger,
            %organization_id,
            matched = workflows.len(),
            "processing trigger"
        );

        // One snapshot, shared read-only by every matched workflow.
        let context = ContextBuilder::build(booking);

        let mut results = Vec::with_capacity(workflows.len());
        for workflow in &workflows {
            if !matches_trigger_config(workflow, &context) {
                debug!(
                    workflow_id = %workflow.id,
                    workflow = %workflow.name,
                    "trigger config filter did not match, skipping"
                );
                continue;
            }

            match self.execute_workflow(workflow, &context).await {
                Ok(result) => {
                    if result.success {
                        info!(workflow_id = %workflow.id, workflow = %workflow.name, "workflow completed");
                    } else {
                        warn!(
                            workflow_id = %workflow.id,
                            workflow = %workflow.name,
                            error = result.error.as_deref().unwrap_or("step failure"),
                            "workflow failed"
                        );
                    }
                    results.push(result);
                }
                Err(err) => {
                    error!(workflow_id = %workflow.id, error = %err, "workflow execution aborted");
                    results.push(ExecutionResult {
                        success: false,
                        workflow_id: workflow.id,
                        execution_id: None,
                        steps: Vec::new(),
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(results)
    }

    /// Run one workflow against an already-built context.
    ///
    /// The execution record is persisted as `running` before any step
    /// executes and finalized exactly once. Steps run strictly in order
    /// and the first failure stops the run; later steps are neither
    /// validated nor executed.
    pub async fn execute_workflow(
        &self,
        workflow: &WorkflowDefinition,
        context: &ExecutionContext,
    ) -> Result<ExecutionResult, EngineError> {
        let mut execution = WorkflowExecution::started(workflow.id, context.clone());
        self.store.create_execution(&execution).await?;

        if workflow.steps.is_empty() {
            warn!(workflow_id = %workflow.id, "workflow has no steps");
            execution.finish_failed("Workflow has no steps");
            return Ok(self.finalize(workflow.id, execution).await);
        }

        for (index, step) in workflow.steps.iter().enumerate() {
            let result = self.executor.execute_step(index, step, context).await;
            let failed = !result.success;
            execution.step_results.push(result);
            if failed {
                break;
            }
        }

        if execution.step_results.iter().any(|r| !r.success) {
            // The specific cause lives in the failing step result.
            execution.finish_failed("One or more steps failed");
        } else {
            execution.finish_completed();
        }

        Ok(self.finalize(workflow.id, execution).await)
    }

    /// Write the terminal status. A store failure here must not strand the
    /// record as `running` nor hide the execution id from the caller: the
    /// run is reported as failed with its real id, and a failed status
    /// carrying the persist error is written in a second best-effort
    /// attempt.
    async fn finalize(
        &self,
        workflow_id: Uuid,
        mut execution: WorkflowExecution,
    ) -> ExecutionResult {
        if let Err(err) = self.store.complete_execution(&execution).await {
            error!(
                execution_id = %execution.id,
                workflow_id = %workflow_id,
                error = %err,
                "failed to persist terminal execution status"
            );

            let message = format!("failed to persist execution outcome: {err}");
            execution.finish_failed(&message);
            if let Err(retry_err) = self.store.complete_execution(&execution).await {
                error!(
                    execution_id = %execution.id,
                    error = %retry_err,
                    "second terminal write failed, record may remain running"
                );
            }

            return ExecutionResult {
                success: false,
                workflow_id,
                execution_id: Some(execution.id),
                steps: execution.step_results.clone(),
                error: Some(message),
            };
        }

        result_of(workflow_id, &execution)
    }
}

fn result_of(workflow_id: Uuid, execution: &WorkflowExecution) -> ExecutionResult {
    ExecutionResult {
        success: execution.status == ExecutionStatus::Completed,
        workflow_id,
        execution_id: Some(execution.id),
        steps: execution.step_results.clone(),
        error: execution.error.clone(),
    }
}

/// Evaluate a definition's optional trigger config against the context.
/// Every top-level key is a dotted context path that must equal the
/// configured value; a missing or non-object config matches everything.
fn matches_trigger_config(workflow: &WorkflowDefinition, context: &ExecutionContext) -> bool {
    let Some(Value::Object(filters)) = &workflow.trigger_config else {
        return true;
    };

    filters
        .iter()
        .all(|(path, expected)| context.get(path) == Some(expected))
}
