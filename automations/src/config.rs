use std::env;
use std::time::Duration;

/// Per-step retry settings.
///
/// The delay is fixed between attempts (not exponential, not jittered) and
/// is awaited with `tokio::time::sleep`, so in-flight runs stay cancellable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total execute attempts per step, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts of the same step.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutomationConfig {
    pub retry: RetryPolicy,
}

impl AutomationConfig {
    /// Read settings from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let max_attempts = env::var("WORKFLOW_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3)
            .max(1);

        let delay_ms = env::var("WORKFLOW_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1000);

        Self {
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(delay_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }
}
