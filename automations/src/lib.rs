// Workflow Automation Engine
//
// Event-driven automation runtime for the Bookline scheduling platform.
// When a domain event fires (a booking is created, cancelled, ...), the
// engine finds the tenant's enabled workflows for that trigger, builds one
// data context from the booking, and runs each workflow's ordered steps
// against the action registry with per-step retry and durable execution
// records.

pub mod actions;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod registry;
pub mod store;
pub mod triggers;

pub use actions::{Action, ActionMetadata, LogMessage, SendWebhook};
pub use config::{AutomationConfig, RetryPolicy};
pub use context::{ContextBuilder, ExecutionContext};
pub use engine::{
    ExecutionStatus, WorkflowDefinition, WorkflowEngine, WorkflowExecution, WorkflowStatus,
    WorkflowStep,
};
pub use error::{ActionError, EngineError, StoreError};
pub use executor::{ExecutionResult, StepExecutor, StepResult};
pub use registry::ActionRegistry;
pub use store::{InMemoryWorkflowStore, PgWorkflowStore, WorkflowStore};
pub use triggers::TriggerType;

#[cfg(test)]
pub(crate) mod test_support {
    use bookline_shared::{Attendee, Booking, BookingStatus, EventType, Host, Organization};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    /// A fully-populated booking for engine and context tests.
    pub(crate) fn sample_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            uid: "bk_7f3a".into(),
            title: "Kickoff with Acme".into(),
            description: Some("Scope the rollout".into()),
            status: BookingStatus::Accepted,
            start_time: now,
            end_time: now + Duration::minutes(45),
            location: Some("https://meet.example.com/abc".into()),
            organization: Organization {
                id: Uuid::new_v4(),
                name: "Acme Inc".into(),
                slug: "acme".into(),
                timezone: Some("UTC".into()),
                created_at: now,
            },
            event_type: Some(EventType {
                id: Uuid::new_v4(),
                organization_id: Uuid::new_v4(),
                slug: "kickoff".into(),
                title: "Kickoff Call".into(),
                description: None,
                duration_minutes: 45,
                price: None,
                currency: None,
                created_at: now,
            }),
            host: Some(Host {
                id: Uuid::new_v4(),
                name: "Dana".into(),
                email: "dana@acme.example".into(),
                timezone: None,
            }),
            attendees: vec![Attendee {
                name: "Sam".into(),
                email: "sam@client.example".into(),
                timezone: Some("Europe/Berlin".into()),
            }],
            created_at: now,
        }
    }
}
