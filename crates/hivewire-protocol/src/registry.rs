//! The event schema registry: every event type the client speaks.
//!
//! Populated once at process start, read-only afterwards. The decode path
//! only knows the wire envelope's event id, so the registry is the
//! id → specification lookup it consults before decoding the payload.
//!
//! The registry is usually built in one place and then shared as
//! `Arc<EventRegistry>` — there is no mutation contract beyond the
//! initial population.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{EventSpecification, SchemaError};

/// A static mapping from numeric event id to [`EventSpecification`].
#[derive(Debug, Default)]
pub struct EventRegistry {
    specs: HashMap<u32, Arc<EventSpecification>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Builds a registry from a collection of specifications.
    ///
    /// # Errors
    /// Returns [`SchemaError::DuplicateEventId`] if two specifications
    /// share an id — ids are the wire contract and must be unique across
    /// the whole registry.
    pub fn with_specs(
        specs: impl IntoIterator<Item = EventSpecification>,
    ) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Adds one specification during initial population.
    ///
    /// Returns the shared handle under which the registry stores it.
    ///
    /// # Errors
    /// Returns [`SchemaError::DuplicateEventId`] if the id is taken.
    pub fn register(
        &mut self,
        spec: EventSpecification,
    ) -> Result<Arc<EventSpecification>, SchemaError> {
        if let Some(existing) = self.specs.get(&spec.id()) {
            return Err(SchemaError::DuplicateEventId {
                id: spec.id(),
                existing: existing.name().to_string(),
                incoming: spec.name().to_string(),
            });
        }

        let spec = Arc::new(spec);
        self.specs.insert(spec.id(), Arc::clone(&spec));
        Ok(spec)
    }

    /// Looks up the specification for an event id.
    pub fn get(&self, event_id: u32) -> Option<&Arc<EventSpecification>> {
        self.specs.get(&event_id)
    }

    /// Iterates over all registered specifications (no particular order).
    /// Used by tooling and by the gateway to subscribe to everything.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EventSpecification>> {
        self.specs.values()
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDescriptor, Permissions, WireType};

    fn spec(id: u32, name: &str) -> EventSpecification {
        EventSpecification::new(
            id,
            name,
            Permissions::all(),
            vec![FieldDescriptor::new("n", WireType::U32)],
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_get_by_id() {
        let mut registry = EventRegistry::new();
        registry.register(spec(1, "chat")).unwrap();
        registry.register(spec(2, "move")).unwrap();

        assert_eq!(registry.get(1).unwrap().name(), "chat");
        assert_eq!(registry.get(2).unwrap().name(), "move");
        assert!(registry.get(3).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_duplicate_id_fails() {
        let mut registry = EventRegistry::new();
        registry.register(spec(1, "chat")).unwrap();

        let err = registry.register(spec(1, "move")).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateEventId { id: 1, .. }
        ));
        // The original registration survives.
        assert_eq!(registry.get(1).unwrap().name(), "chat");
    }

    #[test]
    fn test_with_specs_builds_in_one_go() {
        let registry =
            EventRegistry::with_specs([spec(1, "chat"), spec(2, "move")]).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_with_specs_propagates_duplicate_error() {
        let result = EventRegistry::with_specs([spec(1, "a"), spec(1, "b")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_iter_visits_every_spec() {
        let registry =
            EventRegistry::with_specs([spec(1, "a"), spec(2, "b"), spec(3, "c")]).unwrap();
        let mut ids: Vec<u32> = registry.iter().map(|s| s.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn test_registry_loads_from_json() {
        // The tooling path: a registry described in JSON, revalidated
        // field by field as it loads.
        let json = r#"[
            {
                "id": 10,
                "name": "colony_chat",
                "permissions": { "guest": false, "owner": true, "server": true },
                "structure": [
                    { "name": "channel", "wire_type": "U8", "byte_size": 1 },
                    { "name": "text", "wire_type": "Str", "byte_size": 0 }
                ]
            }
        ]"#;
        let specs: Vec<EventSpecification> = serde_json::from_str(json).unwrap();
        let registry = EventRegistry::with_specs(specs).unwrap();
        let spec = registry.get(10).unwrap();
        assert_eq!(spec.name(), "colony_chat");
        assert_eq!(spec.expected_min_size(), 9);
        assert!(spec.has_variable_tail());
    }
}
