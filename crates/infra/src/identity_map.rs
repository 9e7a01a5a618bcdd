//! Identity map: at most one live instance per (class, identifier).
//!
//! The map owns each entry's snapshot (the last raw data known to be
//! persisted) and one shared handle to the instance. Entries only leave the
//! map through `clear` (by class or all), or when the unit of work deletes
//! the object's row. Dropping the map's binding never frees an instance a
//! caller still holds.
//!
//! All operations take a single coarse lock, so reads and writes on the same
//! identity are mutually exclusive. The lock is never held while events are
//! dispatched.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::{debug, trace};

use objmap_core::{
    MapperError, MapperResult, ObjectHandle, ObjectIdentity, ObjectKey, RawData,
};
use objmap_events::EventDispatcher;

#[derive(Debug)]
struct Entry {
    object: ObjectHandle,
    snapshot: RawData,
}

#[derive(Debug, Default)]
struct Inner {
    entries: IndexMap<ObjectIdentity, Entry>,
    by_object: HashMap<ObjectKey, ObjectIdentity>,
}

impl Inner {
    fn insert(&mut self, identity: ObjectIdentity, object: ObjectHandle, snapshot: RawData) {
        self.by_object.insert(object.key(), identity.clone());
        self.entries.insert(identity, Entry { object, snapshot });
    }

    fn check_stable_identity(&self, object: &ObjectHandle, identity: &ObjectIdentity) -> MapperResult<()> {
        match self.by_object.get(&object.key()) {
            Some(existing) if existing != identity => Err(MapperError::invalid_identity(format!(
                "instance registered as {existing} cannot be re-registered as {identity}"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct IdentityMap {
    dispatcher: Arc<EventDispatcher>,
    inner: RwLock<Inner>,
}

impl IdentityMap {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            dispatcher,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> MapperResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| MapperError::poisoned("identity map"))
    }

    fn write(&self) -> MapperResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| MapperError::poisoned("identity map"))
    }

    fn identity_from_data(&self, class_name: &str, data: &RawData) -> MapperResult<ObjectIdentity> {
        self.dispatcher
            .metadata()
            .get(class_name)?
            .identity_from_data(data)
    }

    /// Registered instance for the identity found in `data`, if any.
    pub fn try_get_by_id(&self, class_name: &str, data: &RawData) -> MapperResult<Option<ObjectHandle>> {
        let identity = self.identity_from_data(class_name, data)?;
        Ok(self
            .read()?
            .entries
            .get(&identity)
            .map(|entry| entry.object.clone()))
    }

    /// Register `object` under the identity found in `data`, storing `data`
    /// as its snapshot.
    ///
    /// Re-registering the same instance refreshes the snapshot. Binding an
    /// identity that already belongs to another instance is an
    /// `IdentityConflict`.
    pub fn add_to_identity_map(&self, object: &ObjectHandle, data: RawData) -> MapperResult<()> {
        let identity = self.identity_from_data(&object.class_name()?, &data)?;
        let mut inner = self.write()?;

        if let Some(entry) = inner.entries.get_mut(&identity) {
            if !entry.object.ptr_eq(object) {
                return Err(MapperError::identity_conflict(identity.to_string()));
            }
            trace!(%identity, "refreshed snapshot");
            entry.snapshot = data;
            return Ok(());
        }

        inner.check_stable_identity(object, &identity)?;
        debug!(%identity, "registered in identity map");
        inner.insert(identity, object.clone(), data);
        Ok(())
    }

    /// Atomic get-or-register: returns the instance bound to the identity in
    /// `data`, registering `object` if the identity is free.
    ///
    /// The flag is `true` when `object` itself was registered.
    pub fn register_or_get(&self, object: ObjectHandle, data: RawData) -> MapperResult<(ObjectHandle, bool)> {
        let identity = self.identity_from_data(&object.class_name()?, &data)?;
        let mut inner = self.write()?;

        if let Some(entry) = inner.entries.get(&identity) {
            return Ok((entry.object.clone(), entry.object.ptr_eq(&object)));
        }

        inner.check_stable_identity(&object, &identity)?;
        debug!(%identity, "registered in identity map");
        inner.insert(identity, object.clone(), data);
        Ok((object, true))
    }

    /// Stored snapshot, or an empty mapping if the object is not registered.
    pub fn get_snapshot(&self, object: &ObjectHandle) -> MapperResult<RawData> {
        let inner = self.read()?;
        Ok(inner
            .by_object
            .get(&object.key())
            .and_then(|identity| inner.entries.get(identity))
            .map(|entry| entry.snapshot.clone())
            .unwrap_or_default())
    }

    /// Overwrite the snapshot of a registered object (after a persist).
    pub fn update_snapshot(&self, object: &ObjectHandle, data: RawData) -> MapperResult<()> {
        let mut inner = self.write()?;
        let identity = inner
            .by_object
            .get(&object.key())
            .cloned()
            .ok_or_else(|| MapperError::not_managed(format!("{object:?}")))?;
        match inner.entries.get_mut(&identity) {
            Some(entry) => {
                trace!(%identity, "updated snapshot");
                entry.snapshot = data;
                Ok(())
            }
            None => Err(MapperError::not_managed(identity.to_string())),
        }
    }

    /// Remove every entry of `class_name`, or every entry when `None`.
    ///
    /// `OnClear` is dispatched before anything is removed; if a listener
    /// fails, nothing is removed. Returns the number of evicted entries.
    pub fn clear(&self, class_name: Option<&str>) -> MapperResult<usize> {
        self.dispatcher.dispatch_on_clear(class_name)?;

        let mut inner = self.write()?;
        let before = inner.entries.len();
        match class_name {
            Some(class_name) => {
                inner.entries.retain(|identity, _| identity.class_name() != class_name);
                inner.by_object.retain(|_, identity| identity.class_name() != class_name);
            }
            None => {
                inner.entries.clear();
                inner.by_object.clear();
            }
        }
        let removed = before - inner.entries.len();
        debug!(class = class_name.unwrap_or("*"), removed, "cleared identity map");
        Ok(removed)
    }

    /// Drop the binding of one object; used once its row has been deleted.
    pub(crate) fn evict(&self, object: &ObjectHandle) -> MapperResult<bool> {
        let mut inner = self.write()?;
        let Some(identity) = inner.by_object.remove(&object.key()) else {
            return Ok(false);
        };
        inner.entries.shift_remove(&identity);
        debug!(%identity, "evicted from identity map");
        Ok(true)
    }

    pub fn contains(&self, object: &ObjectHandle) -> MapperResult<bool> {
        Ok(self.read()?.by_object.contains_key(&object.key()))
    }

    pub fn identity_of(&self, object: &ObjectHandle) -> MapperResult<Option<ObjectIdentity>> {
        Ok(self.read()?.by_object.get(&object.key()).cloned())
    }

    /// Registered instances in registration order, optionally restricted to
    /// one class.
    pub fn objects(&self, class_name: Option<&str>) -> MapperResult<Vec<ObjectHandle>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|(identity, _)| class_name.is_none_or(|c| identity.class_name() == c))
            .map(|(_, entry)| entry.object.clone())
            .collect())
    }

    pub fn len(&self) -> MapperResult<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> MapperResult<bool> {
        Ok(self.len()? == 0)
    }
}
