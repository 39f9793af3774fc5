// Error types for the automation engine

use uuid::Uuid;

/// Errors surfaced by the workflow store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// Execution status transitions are monotonic; a second terminal write
    /// is rejected rather than applied.
    #[error("execution {0} is already finalized")]
    ExecutionFinalized(Uuid),
}

/// Errors that abort a workflow run before a result can be produced.
///
/// Step-level failures are not errors in this sense: they are captured as
/// data in `StepResult` and finalized into the execution record.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("workflow store error: {0}")]
    Store(#[from] StoreError),
}

/// Failure returned by an action's `execute`.
///
/// Execution-phase errors default to retryable; an action that knows a
/// failure is permanent (bad credentials, 4xx from an upstream) can mark it
/// so and skip the remaining retry budget.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    pub retryable: bool,
}

impl ActionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}
