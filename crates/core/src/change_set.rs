//! Field-level diff between an object's current state and its snapshot.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{RawData, Value};

/// One field delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub field: String,
    /// Snapshot value; `Null` when the snapshot had no such field.
    pub old_value: Value,
    pub new_value: Value,
}

/// Ordered set of per-field deltas.
///
/// Insertion order is detection order, which the change-set engine keeps
/// equal to field declaration order. Each field appears at most once.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: IndexMap<String, Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delta; a second call for the same field replaces the first
    /// in place.
    pub fn add_change(&mut self, field: impl Into<String>, old_value: Value, new_value: Value) {
        let field = field.into();
        self.changes.insert(
            field.clone(),
            Change {
                field,
                old_value,
                new_value,
            },
        );
    }

    pub fn get(&self, field: &str) -> Option<&Change> {
        self.changes.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// Overwrite the new value of an existing delta. Returns `false` if the
    /// field has no delta.
    pub fn set_new_value(&mut self, field: &str, new_value: Value) -> bool {
        match self.changes.get_mut(field) {
            Some(change) => {
                change.new_value = new_value;
                true
            }
            None => false,
        }
    }

    /// Drop a field's delta, keeping the order of the rest.
    pub fn remove(&mut self, field: &str) -> Option<Change> {
        self.changes.shift_remove(field)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// `field -> new value` for every delta, in order.
    pub fn new_values(&self) -> RawData {
        self.changes
            .iter()
            .map(|(field, change)| (field.clone(), change.new_value.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = indexmap::map::Values<'a, String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.values()
    }
}
