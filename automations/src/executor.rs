// Step Executor - runs a single workflow step with validation and retry

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::context::ExecutionContext;
use crate::engine::WorkflowStep;
use crate::registry::ActionRegistry;

/// Outcome of one step, part of the execution's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub action_id: String,
    pub success: bool,
    /// Execute attempts made. Zero when the step failed before execution
    /// (missing action id, unknown action, config validation).
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn success(step_index: usize, action_id: &str, attempts: u32, output: Value) -> Self {
        Self {
            step_index,
            action_id: action_id.to_string(),
            success: true,
            attempts,
            output: Some(output),
            error: None,
        }
    }

    fn failure(step_index: usize, action_id: &str, attempts: u32, error: String) -> Self {
        Self {
            step_index,
            action_id: action_id.to_string(),
            success: false,
            attempts,
            output: None,
            error: Some(error),
        }
    }
}

/// Per-workflow result summary returned to the trigger caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub workflow_id: Uuid,
    /// Absent when the run aborted before an execution record existed.
    pub execution_id: Option<Uuid>,
    pub steps: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct StepExecutor {
    registry: Arc<ActionRegistry>,
    retry: RetryPolicy,
}

impl StepExecutor {
    pub fn new(registry: Arc<ActionRegistry>, retry: RetryPolicy) -> Self {
        Self { registry, retry }
    }

    /// Run one step against the shared context.
    ///
    /// Config problems (no action id, unknown action, failed validation)
    /// fail immediately without invoking `execute`. Execution failures are
    /// retried up to the policy's budget with a fixed delay between
    /// attempts; an error the action marks non-retryable stops early.
    pub async fn execute_step(
        &self,
        step_index: usize,
        step: &WorkflowStep,
        context: &ExecutionContext,
    ) -> StepResult {
        let action_id = step.action_id.trim();
        if action_id.is_empty() {
            return StepResult::failure(
                step_index,
                &step.action_id,
                0,
                "Step has no action defined".to_string(),
            );
        }

        let Some(action) = self.registry.get(action_id) else {
            return StepResult::failure(
                step_index,
                action_id,
                0,
                format!("Action not found: {action_id}"),
            );
        };

        let config = render_config(&step.config, context);

        let validation_errors = action.validate(&config);
        if !validation_errors.is_empty() {
            return StepResult::failure(step_index, action_id, 0, validation_errors.join("; "));
        }

        let mut last_error = String::new();
        let mut attempts = 0;
        for attempt in 1..=self.retry.max_attempts {
            attempts = attempt;
            debug!(
                step_index,
                action = action_id,
                attempt,
                max_attempts = self.retry.max_attempts,
                "executing workflow step"
            );

            match action.execute(&config, context).await {
                Ok(output) => {
                    debug!(step_index, action = action_id, attempt, "step succeeded");
                    return StepResult::success(step_index, action_id, attempt, output);
                }
                Err(err) => {
                    warn!(
                        step_index,
                        action = action_id,
                        attempt,
                        retryable = err.retryable,
                        error = %err,
                        "step attempt failed"
                    );
                    last_error = err.message;

                    if !err.retryable {
                        break;
                    }
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        StepResult::failure(step_index, action_id, attempts, last_error)
    }
}

/// Substitute `{{dotted.path}}` references in a step config with values
/// from the context, recursing through objects and arrays. Unresolvable
/// references are left in place so the failure is visible downstream.
pub(crate) fn render_config(config: &Value, context: &ExecutionContext) -> Value {
    match config {
        Value::String(s) => Value::String(render_str(s, context)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_config(v, context)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| render_config(v, context)).collect())
        }
        _ => config.clone(),
    }
}

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap())
}

fn render_str(template: &str, context: &ExecutionContext) -> String {
    let mut result = template.to_string();

    for cap in template_re().captures_iter(template) {
        let path = cap[1].trim();
        if let Some(value) = context.get(path) {
            let replacement = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            result = result.replace(&cap[0], &replacement);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionMetadata};
    use crate::context::ContextBuilder;
    use crate::error::ActionError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scriptable action: fails the first `fail_first` executions, counts
    /// validate/execute invocations.
    pub(crate) struct Scripted {
        pub id: &'static str,
        pub fail_first: u32,
        pub permanent: bool,
        pub validation_errors: Vec<String>,
        pub validate_calls: AtomicU32,
        pub execute_calls: AtomicU32,
    }

    impl Scripted {
        pub fn succeeding(id: &'static str) -> Self {
            Self::failing_first(id, 0)
        }

        pub fn failing_first(id: &'static str, fail_first: u32) -> Self {
            Self {
                id,
                fail_first,
                permanent: false,
                validation_errors: Vec::new(),
                validate_calls: AtomicU32::new(0),
                execute_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Action for Scripted {
        fn id(&self) -> &str {
            self.id
        }

        fn metadata(&self) -> ActionMetadata {
            ActionMetadata {
                id: self.id.into(),
                name: self.id.into(),
                description: String::new(),
                category: "test".into(),
            }
        }

        fn validate(&self, _config: &Value) -> Vec<String> {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            self.validation_errors.clone()
        }

        async fn execute(
            &self,
            config: &Value,
            _context: &ExecutionContext,
        ) -> Result<Value, ActionError> {
            let call = self.execute_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                if self.permanent {
                    return Err(ActionError::permanent("gave up"));
                }
                return Err(ActionError::transient("boom"));
            }
            Ok(json!({ "ok": true, "config": config }))
        }
    }

    fn executor_with(action: Arc<Scripted>) -> (StepExecutor, Arc<Scripted>) {
        let mut registry = ActionRegistry::new();
        registry.register(action.clone());
        let retry = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        };
        (StepExecutor::new(Arc::new(registry), retry), action)
    }

    fn step(action_id: &str, config: Value) -> WorkflowStep {
        WorkflowStep {
            action_id: action_id.to_string(),
            config,
        }
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let (executor, action) = executor_with(Arc::new(Scripted::succeeding("noop")));
        let result = executor
            .execute_step(0, &step("noop", json!({})), &ContextBuilder::preview())
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(action.execute_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_exactly_three_times_then_fails() {
        let (executor, action) = executor_with(Arc::new(Scripted::failing_first("flaky", u32::MAX)));
        let result = executor
            .execute_step(0, &step("flaky", json!({})), &ContextBuilder::preview())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(action.execute_calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn recovers_on_second_attempt() {
        let (executor, action) = executor_with(Arc::new(Scripted::failing_first("flaky", 1)));
        let result = executor
            .execute_step(0, &step("flaky", json!({})), &ContextBuilder::preview())
            .await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(action.execute_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_error_skips_remaining_budget() {
        let mut scripted = Scripted::failing_first("doomed", u32::MAX);
        scripted.permanent = true;
        let (executor, action) = executor_with(Arc::new(scripted));

        let result = executor
            .execute_step(0, &step("doomed", json!({})), &ContextBuilder::preview())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(action.execute_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn validation_failure_never_executes() {
        let mut scripted = Scripted::succeeding("strict");
        scripted.validation_errors = vec!["'template' is required".to_string()];
        let (executor, action) = executor_with(Arc::new(scripted));

        let result = executor
            .execute_step(0, &step("strict", json!({})), &ContextBuilder::preview())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(action.execute_calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.error.as_deref(), Some("'template' is required"));
    }

    #[tokio::test]
    async fn unknown_action_fails_without_attempts() {
        let (executor, _) = executor_with(Arc::new(Scripted::succeeding("noop")));
        let result = executor
            .execute_step(2, &step("ghost", json!({})), &ContextBuilder::preview())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.error.as_deref(), Some("Action not found: ghost"));
        assert_eq!(result.step_index, 2);
    }

    #[tokio::test]
    async fn empty_action_id_fails_without_attempts() {
        let (executor, _) = executor_with(Arc::new(Scripted::succeeding("noop")));
        let result = executor
            .execute_step(0, &step("  ", json!({})), &ContextBuilder::preview())
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.error.as_deref(), Some("Step has no action defined"));
    }

    #[tokio::test]
    async fn config_templates_are_rendered_before_execute() {
        let (executor, _) = executor_with(Arc::new(Scripted::succeeding("noop")));
        let config = json!({
            "message": "New booking: {{booking.title}} for {{attendee.name}}",
            "nested": { "org": "{{organization.slug}}" },
        });

        let result = executor
            .execute_step(0, &step("noop", config), &ContextBuilder::preview())
            .await;

        let rendered = &result.output.unwrap()["config"];
        assert_eq!(
            rendered["message"],
            "New booking: 30 Minute Intro Call for Sam Attendee"
        );
        assert_eq!(rendered["nested"]["org"], "acme");
    }

    #[test]
    fn unresolvable_templates_are_left_in_place() {
        let context = ContextBuilder::preview();
        let rendered = render_config(
            &json!({ "text": "hello {{no.such.path}}", "n": 7 }),
            &context,
        );
        assert_eq!(rendered["text"], "hello {{no.such.path}}");
        assert_eq!(rendered["n"], 7);
    }
}
