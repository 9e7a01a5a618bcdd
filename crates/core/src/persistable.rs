//! Write-payload extension point implemented by domain objects.

use crate::change_set::ChangeSet;
use crate::object::MappedObject;
use crate::value::RawData;

/// Capability an object exposes to take part in inserts and updates.
///
/// Objects opt in by implementing this trait and returning `Some(self)` from
/// [`MappedObject::as_persistable`]. Objects that do not are rejected with
/// `NotPersistable` before any data-source call.
pub trait Persistable: MappedObject {
    /// Full current state, used for inserts.
    fn prepare_persist_change_set(&self) -> RawData;

    /// Final update payload given the computed change set.
    ///
    /// The default sends every changed field's new value; override to drop
    /// derived fields or add computed ones.
    fn prepare_update_change_set(&self, change_set: &ChangeSet) -> RawData {
        change_set.new_values()
    }
}
