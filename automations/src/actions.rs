// Workflow Actions - Pluggable capabilities invoked by workflow steps

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::context::ExecutionContext;
use crate::error::ActionError;

/// Display metadata for the action catalog (authoring UIs, introspection).
/// Not consulted during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

/// A named unit of work a workflow step can invoke.
///
/// Implementations are registered once at startup under a stable string id.
/// `validate` is always called before `execute`; a step whose config fails
/// validation never reaches `execute` and consumes no retry budget.
#[async_trait]
pub trait Action: Send + Sync {
    fn id(&self) -> &str;

    fn metadata(&self) -> ActionMetadata;

    /// Check a step's config. Returns one message per problem; an empty
    /// list means the config is executable.
    fn validate(&self, config: &Value) -> Vec<String>;

    /// Perform the work. The context is shared and read-only; any output
    /// ends up in the step's result payload.
    async fn execute(&self, config: &Value, context: &ExecutionContext)
    -> Result<Value, ActionError>;
}

/// Emits a structured log line. Mostly useful for wiring checks and as the
/// smallest possible reference capability.
pub struct LogMessage;

#[async_trait]
impl Action for LogMessage {
    fn id(&self) -> &str {
        "log.message"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            id: self.id().into(),
            name: "Log Message".into(),
            description: "Write a message to the service log".into(),
            category: "diagnostics".into(),
        }
    }

    fn validate(&self, config: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        match config.get("message").and_then(Value::as_str) {
            Some(m) if !m.trim().is_empty() => {}
            _ => errors.push("'message' is required and must be a non-empty string".to_string()),
        }
        errors
    }

    async fn execute(
        &self,
        config: &Value,
        _context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let message = config
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();

        info!(target: "workflow_action", action = self.id(), %message, "workflow log action");

        Ok(json!({ "logged": true, "message": message }))
    }
}

/// Sends the step's payload to an external HTTP endpoint.
pub struct SendWebhook {
    client: reqwest::Client,
}

impl SendWebhook {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SendWebhook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for SendWebhook {
    fn id(&self) -> &str {
        "webhook.send"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            id: self.id().into(),
            name: "Send Webhook".into(),
            description: "Deliver the configured payload to an HTTP endpoint".into(),
            category: "integrations".into(),
        }
    }

    fn validate(&self, config: &Value) -> Vec<String> {
        let mut errors = Vec::new();

        match config.get("url").and_then(Value::as_str) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
            Some(_) => errors.push("'url' must start with http:// or https://".to_string()),
            None => errors.push("'url' is required".to_string()),
        }

        if let Some(method) = config.get("method").and_then(Value::as_str) {
            if !matches!(method.to_uppercase().as_str(), "GET" | "POST" | "PUT") {
                errors.push(format!("unsupported HTTP method '{method}'"));
            }
        }

        errors
    }

    async fn execute(
        &self,
        config: &Value,
        _context: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::permanent("missing 'url'"))?;
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("POST")
            .to_uppercase();
        let payload = config.get("payload").cloned().unwrap_or(Value::Null);

        let request = match method.as_str() {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url).json(&payload),
            "PUT" => self.client.put(url).json(&payload),
            other => {
                return Err(ActionError::permanent(format!(
                    "unsupported HTTP method '{other}'"
                )));
            }
        };

        // Connection failures and timeouts are worth another attempt.
        let response = request
            .send()
            .await
            .map_err(|e| ActionError::transient(format!("webhook request failed: {e}")))?;

        let status = response.status().as_u16();
        if response.status().is_server_error() {
            return Err(ActionError::transient(format!(
                "webhook endpoint returned {status}"
            )));
        }
        if response.status().is_client_error() {
            return Err(ActionError::permanent(format!(
                "webhook endpoint returned {status}"
            )));
        }

        Ok(json!({ "url": url, "status_code": status }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn log_message_requires_a_message() {
        let action = LogMessage;
        assert!(!action.validate(&json!({})).is_empty());
        assert!(!action.validate(&json!({ "message": "   " })).is_empty());
        assert!(action.validate(&json!({ "message": "hi" })).is_empty());
    }

    #[tokio::test]
    async fn log_message_reports_what_it_logged() {
        let action = LogMessage;
        let output = action
            .execute(&json!({ "message": "booking confirmed" }), &ContextBuilder::preview())
            .await
            .unwrap();
        assert_eq!(output["message"], "booking confirmed");
    }

    #[test]
    fn webhook_validation() {
        let action = SendWebhook::new();
        assert!(!action.validate(&json!({})).is_empty());
        assert!(!action.validate(&json!({ "url": "ftp://nope" })).is_empty());
        assert!(
            !action
                .validate(&json!({ "url": "https://ok", "method": "DELETE" }))
                .is_empty()
        );
        assert!(
            action
                .validate(&json!({ "url": "https://ok", "method": "post" }))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn webhook_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/bookings"))
            .and(body_json(json!({ "booking_uid": "bk_1" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let action = SendWebhook::new();
        let config = json!({
            "url": format!("{}/hooks/bookings", server.uri()),
            "payload": { "booking_uid": "bk_1" },
        });

        let output = action
            .execute(&config, &ContextBuilder::preview())
            .await
            .unwrap();
        assert_eq!(output["status_code"], 200);
    }

    #[tokio::test]
    async fn webhook_maps_status_classes_to_retryability() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let action = SendWebhook::new();
        let preview = ContextBuilder::preview();

        let err = action
            .execute(&json!({ "url": format!("{}/flaky", server.uri()) }), &preview)
            .await
            .unwrap_err();
        assert!(err.retryable);

        let err = action
            .execute(&json!({ "url": format!("{}/gone", server.uri()) }), &preview)
            .await
            .unwrap_err();
        assert!(!err.retryable);
    }
}
