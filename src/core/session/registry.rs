//! Deduplicated, insertion-ordered collection of discovered peripherals.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::core::bluetooth::types::PeripheralId;

/// A discovered peripheral as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRecord {
    pub id: PeripheralId,
    pub name: String,
}

/// Every named peripheral seen since the last clear.
///
/// Membership is keyed by identity, listing order is arrival order. Records
/// are never mutated after insertion and only leave through [`clear`].
///
/// [`clear`]: PeripheralRegistry::clear
#[derive(Debug, Default)]
pub struct PeripheralRegistry {
    by_id: HashMap<PeripheralId, PeripheralRecord>,
    order: Vec<PeripheralId>,
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a peripheral on first sight. Repeat advertisements for a known
    /// identity and advertisements without a name are ignored.
    ///
    /// Returns true when a new record was added.
    pub fn record(&mut self, id: PeripheralId, name: Option<&str>) -> bool {
        let Some(name) = name.filter(|name| !name.is_empty()) else {
            debug!("Ignoring unnamed advertisement from {}", id);
            return false;
        };
        if self.by_id.contains_key(&id) {
            return false;
        }

        self.order.push(id.clone());
        self.by_id.insert(
            id.clone(),
            PeripheralRecord {
                id,
                name: name.to_string(),
            },
        );
        true
    }

    /// Resolves an identity to its record.
    pub fn lookup(&self, id: &PeripheralId) -> Option<&PeripheralRecord> {
        self.by_id.get(id)
    }

    /// Records in discovery order. Restartable; repeated calls yield the same
    /// order until new peripherals arrive.
    pub fn iter(&self) -> impl Iterator<Item = &PeripheralRecord> {
        self.order.iter().map(|id| &self.by_id[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every record, typically at the start of a new scan cycle.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: &str) -> PeripheralId {
        PeripheralId::new(raw)
    }

    #[test]
    fn repeat_discoveries_register_once() {
        let mut registry = PeripheralRegistry::new();
        assert!(registry.record(pid("1"), Some("Widget")));
        assert!(!registry.record(pid("1"), Some("Widget")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&pid("1")).unwrap().name, "Widget");
    }

    #[test]
    fn unnamed_peripherals_are_not_admitted() {
        let mut registry = PeripheralRegistry::new();
        assert!(!registry.record(pid("1"), None));
        assert!(!registry.record(pid("2"), Some("")));
        assert!(registry.is_empty());
    }

    #[test]
    fn listing_follows_arrival_order_and_is_stable() {
        let mut registry = PeripheralRegistry::new();
        registry.record(pid("b"), Some("Second"));
        registry.record(pid("a"), Some("First"));
        registry.record(pid("c"), Some("Third"));

        let names: Vec<_> = registry.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Second", "First", "Third"]);

        // A second pass yields the same order.
        let again: Vec<_> = registry.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn clear_empties_the_registry() {
        let mut registry = PeripheralRegistry::new();
        registry.record(pid("1"), Some("Widget"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup(&pid("1")).is_none());
    }
}
