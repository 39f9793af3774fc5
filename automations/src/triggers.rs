// Workflow Triggers - Event keys that can start workflow execution

use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of domain event an automation listens for.
///
/// Trigger types are opaque string keys (`"booking.created"`), so tenants
/// and integrations can introduce new event classes without an engine
/// change. The engine only ever compares them for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerType(String);

pub const BOOKING_CREATED: &str = "booking.created";
pub const BOOKING_RESCHEDULED: &str = "booking.rescheduled";
pub const BOOKING_CANCELLED: &str = "booking.cancelled";
pub const BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const BOOKING_REJECTED: &str = "booking.rejected";
pub const BOOKING_NO_SHOW: &str = "booking.no_show";
pub const BOOKING_PAYMENT_INITIATED: &str = "booking.payment_initiated";
pub const EVENT_TYPE_CREATED: &str = "event_type.created";

impl TriggerType {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn booking_created() -> Self {
        Self::new(BOOKING_CREATED)
    }

    pub fn booking_rescheduled() -> Self {
        Self::new(BOOKING_RESCHEDULED)
    }

    pub fn booking_cancelled() -> Self {
        Self::new(BOOKING_CANCELLED)
    }

    pub fn booking_confirmed() -> Self {
        Self::new(BOOKING_CONFIRMED)
    }

    pub fn booking_rejected() -> Self {
        Self::new(BOOKING_REJECTED)
    }

    pub fn booking_no_show() -> Self {
        Self::new(BOOKING_NO_SHOW)
    }

    pub fn booking_payment_initiated() -> Self {
        Self::new(BOOKING_PAYMENT_INITIATED)
    }

    pub fn event_type_created() -> Self {
        Self::new(EVENT_TYPE_CREATED)
    }

    /// The trigger keys the platform emits today, for authoring UIs.
    /// Equality matching works for any key, listed here or not.
    pub fn catalog() -> Vec<TriggerType> {
        [
            BOOKING_CREATED,
            BOOKING_RESCHEDULED,
            BOOKING_CANCELLED,
            BOOKING_CONFIRMED,
            BOOKING_REJECTED,
            BOOKING_NO_SHOW,
            BOOKING_PAYMENT_INITIATED,
            EVENT_TYPE_CREATED,
        ]
        .into_iter()
        .map(TriggerType::new)
        .collect()
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TriggerType {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_type_equality() {
        assert_eq!(TriggerType::booking_created(), TriggerType::new("booking.created"));
        assert_ne!(TriggerType::booking_created(), TriggerType::booking_cancelled());
    }

    #[test]
    fn trigger_type_serde_is_a_bare_string() {
        let trigger = TriggerType::booking_created();
        assert_eq!(serde_json::to_string(&trigger).unwrap(), "\"booking.created\"");

        let parsed: TriggerType = serde_json::from_str("\"custom.event\"").unwrap();
        assert_eq!(parsed.as_str(), "custom.event");
    }

    #[test]
    fn catalog_matches_the_named_constructors() {
        let catalog = TriggerType::catalog();
        let named = [
            TriggerType::booking_created(),
            TriggerType::booking_rescheduled(),
            TriggerType::booking_cancelled(),
            TriggerType::booking_confirmed(),
            TriggerType::booking_rejected(),
            TriggerType::booking_no_show(),
            TriggerType::booking_payment_initiated(),
            TriggerType::event_type_created(),
        ];
        assert_eq!(catalog.len(), named.len());
        for trigger in &named {
            assert!(catalog.contains(trigger), "missing {trigger}");
        }
    }
}
