// Action Registry - id -> capability lookup, built once at startup

use std::collections::HashMap;
use std::sync::Arc;

use crate::actions::{Action, ActionMetadata, LogMessage, SendWebhook};

/// In-memory lookup from action id to capability.
///
/// Populated from the compiled-in capabilities during startup and treated
/// as read-only while workflows run. Registration is a keyed overwrite:
/// the last registration for an id wins.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in capabilities.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LogMessage));
        registry.register(Arc::new(SendWebhook::new()));
        registry
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.id().to_string(), action);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(id).cloned()
    }

    /// Catalog metadata for authoring UIs, sorted by id for stable output.
    pub fn catalog(&self) -> Vec<ActionMetadata> {
        let mut entries: Vec<ActionMetadata> =
            self.actions.values().map(|a| a.metadata()).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
