//! Change-set computation and write-payload preparation.

use std::sync::Arc;

use objmap_core::{
    ChangeSet, ClassMetadataRegistry, MappedObject, MapperError, MapperResult, ObjectHandle,
    Persistable, RawData, Value,
};

/// Diffs objects against their snapshots and builds insert/update payloads.
///
/// Pure: nothing here touches the identity map or a data source, so a
/// change set can be recomputed any number of times with the same result.
#[derive(Debug, Clone)]
pub struct ChangeSetEngine {
    metadata: Arc<ClassMetadataRegistry>,
}

impl ChangeSetEngine {
    pub fn new(metadata: Arc<ClassMetadataRegistry>) -> Self {
        Self { metadata }
    }

    /// Field-level diff between the object's current state and `snapshot`.
    ///
    /// Every mapped field the object exposes is compared by value against
    /// the snapshot; a field missing from the snapshot counts as `null`.
    /// Entries follow field declaration order.
    pub fn compute(&self, object: &ObjectHandle, snapshot: &RawData) -> MapperResult<ChangeSet> {
        let guard = object.read()?;
        let metadata = self.metadata.get(guard.class_name())?;

        let mut change_set = ChangeSet::new();
        for (field, current) in metadata.field_values(&*guard) {
            let previous = snapshot.get(&field).cloned().unwrap_or(Value::Null);
            if previous != current {
                change_set.add_change(field, previous, current);
            }
        }
        Ok(change_set)
    }

    /// Full current state for an insert.
    pub fn prepare_persist_change_set(&self, object: &ObjectHandle) -> MapperResult<RawData> {
        let guard = object.read()?;
        Ok(Self::persistable(&*guard)?.prepare_persist_change_set())
    }

    /// Update payload, post-processed by the object itself.
    pub fn prepare_update_change_set(
        &self,
        object: &ObjectHandle,
        change_set: &ChangeSet,
    ) -> MapperResult<RawData> {
        let guard = object.read()?;
        Ok(Self::persistable(&*guard)?.prepare_update_change_set(change_set))
    }

    /// Fail with `NotPersistable` unless the object can build write payloads.
    pub fn ensure_persistable(&self, object: &ObjectHandle) -> MapperResult<()> {
        let guard = object.read()?;
        Self::persistable(&*guard).map(|_| ())
    }

    fn persistable(object: &dyn MappedObject) -> MapperResult<&dyn Persistable> {
        object
            .as_persistable()
            .ok_or_else(|| MapperError::not_persistable(object.class_name()))
    }
}
