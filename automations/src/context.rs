// Execution Context - Data snapshot handed to every step of a workflow run

use bookline_shared::Booking;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// The read-only data snapshot built once per trigger event.
///
/// One context is shared by every workflow matched by a trigger, and by
/// every step within a run; steps never mutate it and step outputs are not
/// merged back in. The inner value is a plain JSON object so the snapshot
/// can be persisted verbatim inside the execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext(Value);

impl ExecutionContext {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a value by dotted path, e.g. `"booking.title"` or
    /// `"organization.id"`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Top-level namespaces, used to check authoring-time previews against
    /// the runtime shape.
    pub fn top_level_keys(&self) -> Vec<&str> {
        match &self.0 {
            Value::Object(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// Builds the execution context from a triggering booking.
pub struct ContextBuilder;

impl ContextBuilder {
    /// Pure function of the booking: no I/O, never fails. Missing
    /// substructures (event type, host, attendees) become empty-string
    /// defaults so template references resolve to something renderable.
    pub fn build(booking: &Booking) -> ExecutionContext {
        let event = match &booking.event_type {
            Some(et) => json!({
                "id": et.id,
                "slug": et.slug,
                "title": et.title,
                "description": et.description.as_deref().unwrap_or(""),
                "duration_minutes": et.duration_minutes,
                "price": et.price.map(|p| p.to_string()).unwrap_or_default(),
                "currency": et.currency.as_deref().unwrap_or(""),
            }),
            None => json!({
                "id": "",
                "slug": "",
                "title": "",
                "description": "",
                "duration_minutes": 0,
                "price": "",
                "currency": "",
            }),
        };

        let host = match &booking.host {
            Some(h) => json!({
                "name": h.name,
                "email": h.email,
                "timezone": h.timezone.as_deref().unwrap_or(""),
            }),
            None => json!({ "name": "", "email": "", "timezone": "" }),
        };

        let attendee = match booking.attendees.first() {
            Some(a) => json!({
                "name": a.name,
                "email": a.email,
                "timezone": a.timezone.as_deref().unwrap_or(""),
            }),
            None => json!({ "name": "", "email": "", "timezone": "" }),
        };

        let attendees: Vec<Value> = booking
            .attendees
            .iter()
            .map(|a| {
                json!({
                    "name": a.name,
                    "email": a.email,
                    "timezone": a.timezone.as_deref().unwrap_or(""),
                })
            })
            .collect();

        ExecutionContext(json!({
            "booking": {
                "id": booking.id,
                "uid": booking.uid,
                "title": booking.title,
                "description": booking.description.as_deref().unwrap_or(""),
                "status": booking.status.as_str(),
                "start_time": booking.start_time.to_rfc3339(),
                "end_time": booking.end_time.to_rfc3339(),
                "duration_minutes": booking.duration_minutes(),
                "location": booking.location.as_deref().unwrap_or(""),
                "created_at": booking.created_at.to_rfc3339(),
            },
            "event": event,
            "organization": {
                "id": booking.organization.id,
                "name": booking.organization.name,
                "slug": booking.organization.slug,
                "timezone": booking.organization.timezone.as_deref().unwrap_or(""),
            },
            "host": host,
            "attendee": attendee,
            "attendees": attendees,
        }))
    }

    /// Sample context for dry runs and authoring-time previews. Must keep
    /// the same top-level keys as `build` so validation against a preview
    /// reflects runtime reality.
    pub fn preview() -> ExecutionContext {
        ExecutionContext(json!({
            "booking": {
                "id": Uuid::nil(),
                "uid": "demo-booking-1",
                "title": "30 Minute Intro Call",
                "description": "Preview booking",
                "status": "accepted",
                "start_time": "2026-01-15T10:00:00+00:00",
                "end_time": "2026-01-15T10:30:00+00:00",
                "duration_minutes": 30,
                "location": "https://meet.example.com/demo",
                "created_at": "2026-01-10T09:00:00+00:00",
            },
            "event": {
                "id": Uuid::nil(),
                "slug": "intro-call",
                "title": "Intro Call",
                "description": "",
                "duration_minutes": 30,
                "price": "",
                "currency": "",
            },
            "organization": {
                "id": Uuid::nil(),
                "name": "Acme Inc",
                "slug": "acme",
                "timezone": "UTC",
            },
            "host": {
                "name": "Dana Host",
                "email": "dana@acme.example",
                "timezone": "UTC",
            },
            "attendee": {
                "name": "Sam Attendee",
                "email": "sam@client.example",
                "timezone": "Europe/Berlin",
            },
            "attendees": [
                {
                    "name": "Sam Attendee",
                    "email": "sam@client.example",
                    "timezone": "Europe/Berlin",
                }
            ],
        }))
    }
}
