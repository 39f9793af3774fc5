// Workflow Store - persistence for definitions and execution records

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::engine::{
    ExecutionStatus, WorkflowDefinition, WorkflowExecution, WorkflowStatus, WorkflowStep,
};
use crate::error::StoreError;
use crate::triggers::TriggerType;

/// Persistence boundary for workflow definitions and execution records.
///
/// Definitions are soft-deleted only. Execution records are written once
/// with `running` status before any step runs and finalized with exactly
/// one terminal update; implementations must reject a second terminal
/// write so the `running -> completed | failed` transition stays monotonic.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Enabled definitions for one trigger within one organization:
    /// `status = active`, not soft-deleted. Order is the lookup order the
    /// engine will process them in.
    async fn find_active(
        &self,
        trigger: &TriggerType,
        organization_id: Uuid,
    ) -> Result<Vec<WorkflowDefinition>, StoreError>;

    async fn insert_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError>;

    async fn update_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError>;

    async fn soft_delete_workflow(&self, workflow_id: Uuid) -> Result<(), StoreError>;

    /// Persist a fresh `running` execution record.
    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    /// Single atomic terminal update of status, error, step log and
    /// completion time.
    async fn complete_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    async fn get_execution(&self, id: Uuid) -> Result<WorkflowExecution, StoreError>;

    /// Recent executions of one workflow, newest first.
    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;
}

/// Map-backed store for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<Vec<WorkflowDefinition>>,
    executions: RwLock<HashMap<Uuid, WorkflowExecution>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of execution records, across all workflows.
    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn find_active(
        &self,
        trigger: &TriggerType,
        organization_id: Uuid,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let workflows = self.workflows.read().await;
        Ok(workflows
            .iter()
            .filter(|w| {
                w.trigger_type == *trigger
                    && w.organization_id == organization_id
                    && w.status == WorkflowStatus::Active
                    && !w.deleted
            })
            .cloned()
            .collect())
    }

    async fn insert_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError> {
        self.workflows.write().await.push(workflow.clone());
        Ok(())
    }

    async fn update_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let slot = workflows
            .iter_mut()
            .find(|w| w.id == workflow.id)
            .ok_or(StoreError::WorkflowNotFound(workflow.id))?;
        *slot = workflow.clone();
        Ok(())
    }

    async fn soft_delete_workflow(&self, workflow_id: Uuid) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .iter_mut()
            .find(|w| w.id == workflow_id)
            .ok_or(StoreError::WorkflowNotFound(workflow_id))?;
        workflow.deleted = true;
        workflow.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn complete_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        let stored = executions
            .get_mut(&execution.id)
            .ok_or(StoreError::ExecutionNotFound(execution.id))?;
        if stored.status != ExecutionStatus::Running {
            return Err(StoreError::ExecutionFinalized(execution.id));
        }
        *stored = execution.clone();
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<WorkflowExecution, StoreError> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::ExecutionNotFound(id))
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let executions = self.executions.read().await;
        let mut matched: Vec<WorkflowExecution> = executions
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matched.truncate(limit);
        Ok(matched)
    }
}

/// Postgres-backed store.
///
/// `workflows.steps`, `workflow_executions.context` and
/// `workflow_executions.step_results` are jsonb columns; the terminal
/// update is guarded by `status = 'running'` so concurrent or repeated
/// finalizations cannot overwrite a terminal record.
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type ExecutionRow = (
    Uuid,                           // id
    Uuid,                           // workflow_id
    serde_json::Value,              // context
    String,                         // status
    Option<String>,                 // error
    serde_json::Value,              // step_results
    DateTime<Utc>,                  // started_at
    Option<DateTime<Utc>>,          // completed_at
);

type WorkflowRow = (
    Uuid,                           // id
    Uuid,                           // organization_id
    String,                         // name
    Option<String>,                 // description
    String,                         // trigger_type
    Option<serde_json::Value>,      // trigger_config
    serde_json::Value,              // steps
    String,                         // status
    bool,                           // deleted
    Option<Uuid>,                   // created_by
    DateTime<Utc>,                  // created_at
    Option<DateTime<Utc>>,          // updated_at
);

fn workflow_from_row(row: WorkflowRow) -> Option<WorkflowDefinition> {
    let status = match row.7.as_str() {
        "draft" => WorkflowStatus::Draft,
        "active" => WorkflowStatus::Active,
        "inactive" => WorkflowStatus::Inactive,
        other => {
            warn!(workflow_id = %row.0, status = other, "skipping workflow with unknown status");
            return None;
        }
    };

    let steps: Vec<WorkflowStep> = match serde_json::from_value(row.6) {
        Ok(steps) => steps,
        Err(err) => {
            warn!(workflow_id = %row.0, error = %err, "skipping workflow with undecodable steps");
            return None;
        }
    };

    Some(WorkflowDefinition {
        id: row.0,
        organization_id: row.1,
        name: row.2,
        description: row.3,
        trigger_type: TriggerType::new(row.4),
        trigger_config: row.5,
        steps,
        status,
        deleted: row.8,
        created_by: row.9,
        created_at: row.10,
        updated_at: row.11,
    })
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn find_active(
        &self,
        trigger: &TriggerType,
        organization_id: Uuid,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT
                id, organization_id, name, description, trigger_type, trigger_config,
                steps, status, deleted, created_by, created_at, updated_at
            FROM workflows
            WHERE trigger_type = $1
              AND organization_id = $2
              AND status = 'active'
              AND deleted = false
            ORDER BY created_at ASC
            "#,
        )
        .bind(trigger.as_str())
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(workflow_from_row).collect())
    }

    async fn insert_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflows
            (id, organization_id, name, description, trigger_type, trigger_config,
             steps, status, deleted, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(workflow.id)
        .bind(workflow.organization_id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.trigger_type.as_str())
        .bind(workflow.trigger_config.as_ref().map(Json))
        .bind(Json(&workflow.steps))
        .bind(workflow.status.as_str())
        .bind(workflow.deleted)
        .bind(workflow.created_by)
        .bind(workflow.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = $2, description = $3, trigger_type = $4, trigger_config = $5,
                steps = $6, status = $7, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(workflow.id)
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.trigger_type.as_str())
        .bind(workflow.trigger_config.as_ref().map(Json))
        .bind(Json(&workflow.steps))
        .bind(workflow.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WorkflowNotFound(workflow.id));
        }
        Ok(())
    }

    async fn soft_delete_workflow(&self, workflow_id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE workflows SET deleted = true, updated_at = NOW() WHERE id = $1")
                .bind(workflow_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WorkflowNotFound(workflow_id));
        }
        Ok(())
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_executions
            (id, workflow_id, context, status, error, step_results, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(execution.id)
        .bind(execution.workflow_id)
        .bind(Json(execution.context.as_value()))
        .bind(execution.status.as_str())
        .bind(&execution.error)
        .bind(Json(&execution.step_results))
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2, error = $3, step_results = $4, completed_at = $5
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(execution.id)
        .bind(execution.status.as_str())
        .bind(&execution.error)
        .bind(Json(&execution.step_results))
        .bind(execution.completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionFinalized(execution.id));
        }
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<WorkflowExecution, StoreError> {
        let row = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, workflow_id, context, status, error, step_results, started_at, completed_at
            FROM workflow_executions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ExecutionNotFound(id))?;

        execution_from_row(row)
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let rows = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT id, workflow_id, context, status, error, step_results, started_at, completed_at
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(workflow_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(execution_from_row).collect()
    }
}

fn execution_from_row(row: ExecutionRow) -> Result<WorkflowExecution, StoreError> {
    let status = match row.3.as_str() {
        "running" => ExecutionStatus::Running,
        "completed" => ExecutionStatus::Completed,
        _ => ExecutionStatus::Failed,
    };

    Ok(WorkflowExecution {
        id: row.0,
        workflow_id: row.1,
        context: serde_json::from_value(row.2)?,
        status,
        error: row.4,
        step_results: serde_json::from_value(row.5)?,
        started_at: row.6,
        completed_at: row.7,
    })
}
