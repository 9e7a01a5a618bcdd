//! Unit of work (write path).
//!
//! Collects new objects to insert and managed objects to delete, then writes
//! everything in one `flush`. Managed objects need no scheduling for
//! updates: every flush diffs each of them against its snapshot.
//!
//! ## Flush order
//!
//! ```text
//! PreFlush (listeners, then each object's PreFlush callbacks)
//!   ↓
//! OnFlush
//!   ↓
//! inserts:  PrePersist → persist payload → DataSource::insert → register → PostPersist
//!   ↓
//! updates:  compute → (skip if empty) → PreUpdate(+ChangeSet) → update payload
//!           → DataSource::update → update snapshot → PostUpdate
//!   ↓
//! removals: PreRemove → DataSource::delete → evict → PostRemove
//!   ↓
//! PostFlush
//! ```
//!
//! The first error stops the flush and is returned as is. Work completed
//! before it stays done: written objects leave the schedule, their
//! snapshots are current, and a retried flush picks up only what is left.
//! Nothing is rolled back; transactions belong to the data source.
//!
//! The `NotPersistable` check for an object always happens before the first
//! data-source call made on its behalf.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::Serialize;
use tracing::{debug, info_span, trace};
use uuid::Uuid;

use objmap_core::{
    ChangeSet, ClassMetadata, MapperError, MapperResult, ObjectHandle, RawData, Value,
};
use objmap_events::EventDispatcher;

use crate::change_set_engine::ChangeSetEngine;
use crate::config::MapperConfig;
use crate::data_source::DataSource;
use crate::identity_map::IdentityMap;

/// What one flush wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.removed == 0
    }
}

#[derive(Debug, Default)]
struct Schedule {
    inserts: Vec<ObjectHandle>,
    removals: Vec<ObjectHandle>,
}

fn position(list: &[ObjectHandle], object: &ObjectHandle) -> Option<usize> {
    list.iter().position(|o| o.ptr_eq(object))
}

fn unschedule(list: &mut Vec<ObjectHandle>, object: &ObjectHandle) {
    if let Some(i) = position(list, object) {
        list.remove(i);
    }
}

fn change_deltas(change_set: &ChangeSet) -> impl Iterator<Item = (&str, &Value)> {
    change_set.iter().map(|c| (c.field.as_str(), &c.new_value))
}

/// Fail with `InvalidIdentity` if any of `values` moves an identifier field
/// away from its snapshot value.
fn ensure_identifier_unchanged<'v>(
    metadata: &ClassMetadata,
    snapshot: &RawData,
    values: impl IntoIterator<Item = (&'v str, &'v Value)>,
) -> MapperResult<()> {
    let identifier = metadata.identifier_fields();
    for (field, value) in values {
        if identifier.iter().any(|f| f == field) && snapshot.get(field) != Some(value) {
            return Err(MapperError::invalid_identity(format!(
                "identifier field '{field}' of a managed {} changed",
                metadata.class_name()
            )));
        }
    }
    Ok(())
}

pub struct UnitOfWork {
    identity_map: Arc<IdentityMap>,
    dispatcher: Arc<EventDispatcher>,
    engine: ChangeSetEngine,
    data_sources: RwLock<HashMap<String, Arc<dyn DataSource>>>,
    schedule: Mutex<Schedule>,
    config: MapperConfig,
}

impl UnitOfWork {
    pub fn new(identity_map: Arc<IdentityMap>, dispatcher: Arc<EventDispatcher>) -> Self {
        let engine = ChangeSetEngine::new(dispatcher.metadata().clone());
        Self {
            identity_map,
            dispatcher,
            engine,
            data_sources: RwLock::new(HashMap::new()),
            schedule: Mutex::new(Schedule::default()),
            config: MapperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Route writes for `class_name` to `data_source`.
    pub fn register_data_source(
        &self,
        class_name: impl Into<String>,
        data_source: Arc<dyn DataSource>,
    ) -> MapperResult<()> {
        let class_name = class_name.into();
        self.dispatcher.metadata().get(&class_name)?;
        self.data_sources
            .write()
            .map_err(|_| MapperError::poisoned("unit of work data sources"))?
            .insert(class_name, data_source);
        Ok(())
    }

    pub fn change_set_engine(&self) -> &ChangeSetEngine {
        &self.engine
    }

    fn schedule(&self) -> MapperResult<MutexGuard<'_, Schedule>> {
        self.schedule
            .lock()
            .map_err(|_| MapperError::poisoned("unit of work schedule"))
    }

    fn data_source(&self, class_name: &str) -> MapperResult<Arc<dyn DataSource>> {
        self.data_sources
            .read()
            .map_err(|_| MapperError::poisoned("unit of work data sources"))?
            .get(class_name)
            .cloned()
            .ok_or_else(|| {
                MapperError::data_source(format!("no data source registered for '{class_name}'"))
            })
    }

    /// Schedule a new object for insertion.
    ///
    /// Persisting a managed object is a no-op, except that it cancels a
    /// pending removal.
    pub fn persist(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.engine.ensure_persistable(object)?;
        let class_name = object.class_name()?;
        self.dispatcher.metadata().get(&class_name)?;

        let managed = self.identity_map.contains(object)?;
        let mut schedule = self.schedule()?;
        if managed {
            unschedule(&mut schedule.removals, object);
        } else if position(&schedule.inserts, object).is_none() {
            trace!(class = %class_name, "scheduled for insert");
            schedule.inserts.push(object.clone());
        }
        Ok(())
    }

    /// Schedule a managed object for deletion, or cancel a pending insert.
    pub fn remove(&self, object: &ObjectHandle) -> MapperResult<()> {
        let managed = self.identity_map.contains(object)?;
        let mut schedule = self.schedule()?;

        if let Some(i) = position(&schedule.inserts, object) {
            schedule.inserts.remove(i);
            return Ok(());
        }
        if !managed {
            return Err(MapperError::not_managed(format!("{object:?}")));
        }
        if position(&schedule.removals, object).is_none() {
            trace!("scheduled for removal");
            schedule.removals.push(object.clone());
        }
        Ok(())
    }

    /// Managed or scheduled for insert, and not scheduled for removal.
    pub fn contains(&self, object: &ObjectHandle) -> MapperResult<bool> {
        let managed = self.identity_map.contains(object)?;
        let schedule = self.schedule()?;
        if position(&schedule.removals, object).is_some() {
            return Ok(false);
        }
        Ok(managed || position(&schedule.inserts, object).is_some())
    }

    pub fn is_scheduled_for_insert(&self, object: &ObjectHandle) -> MapperResult<bool> {
        Ok(position(&self.schedule()?.inserts, object).is_some())
    }

    pub fn is_scheduled_for_removal(&self, object: &ObjectHandle) -> MapperResult<bool> {
        Ok(position(&self.schedule()?.removals, object).is_some())
    }

    /// Drop pending work for `class_name` (or all) and clear the identity map
    /// the same way.
    pub fn clear(&self, class_name: Option<&str>) -> MapperResult<usize> {
        {
            let mut schedule = self.schedule()?;
            match class_name {
                None => *schedule = Schedule::default(),
                Some(class_name) => {
                    let keep = |o: &ObjectHandle| {
                        o.class_name().map(|c| c != class_name).unwrap_or(true)
                    };
                    schedule.inserts.retain(keep);
                    schedule.removals.retain(keep);
                }
            }
        }
        self.identity_map.clear(class_name)
    }

    /// Write all pending inserts, updates and removals.
    pub fn flush(&self) -> MapperResult<FlushReport> {
        let flush_id = Uuid::now_v7();
        let span = info_span!("flush", name = %self.config.name, %flush_id);
        let _enter = span.enter();

        let (inserts, removals) = {
            let schedule = self.schedule()?;
            (schedule.inserts.clone(), schedule.removals.clone())
        };
        let managed: Vec<ObjectHandle> = self
            .identity_map
            .objects(None)?
            .into_iter()
            .filter(|o| position(&removals, o).is_none())
            .collect();

        self.dispatcher.dispatch_pre_flush()?;
        let mut pre_flush_subjects = inserts.clone();
        pre_flush_subjects.extend(managed.iter().cloned());
        self.dispatcher
            .dispatch_pre_flush_lifecycle_callbacks(&pre_flush_subjects)?;
        self.dispatcher.dispatch_on_flush()?;

        let mut report = FlushReport::default();
        for object in &inserts {
            self.execute_insert(object)?;
            report.inserted += 1;
        }
        for object in &managed {
            if self.execute_update(object)? {
                report.updated += 1;
            }
        }
        for object in &removals {
            self.execute_removal(object)?;
            report.removed += 1;
        }

        self.dispatcher.dispatch_post_flush()?;
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            "flushed"
        );
        Ok(report)
    }

    fn execute_insert(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatcher.dispatch_pre_persist(object)?;
        let data = self.engine.prepare_persist_change_set(object)?;

        let class_name = object.class_name()?;
        if let Some(existing) = self.identity_map.try_get_by_id(&class_name, &data)? {
            if !existing.ptr_eq(object) {
                let identity = self
                    .dispatcher
                    .metadata()
                    .get(&class_name)?
                    .identity_from_data(&data)?;
                return Err(MapperError::identity_conflict(identity.to_string()));
            }
        }

        self.data_source(&class_name)?.insert(&data)?;
        self.identity_map.add_to_identity_map(object, data)?;
        unschedule(&mut self.schedule()?.inserts, object);
        trace!(class = %class_name, "inserted");

        self.dispatcher.dispatch_post_persist(object)
    }

    /// Returns whether a write was made.
    fn execute_update(&self, object: &ObjectHandle) -> MapperResult<bool> {
        let snapshot = self.identity_map.get_snapshot(object)?;
        let mut change_set = self.engine.compute(object, &snapshot)?;
        if change_set.is_empty() {
            return Ok(false);
        }

        let class_name = object.class_name()?;
        let metadata = self.dispatcher.metadata().get(&class_name)?;
        ensure_identifier_unchanged(&metadata, &snapshot, change_deltas(&change_set))?;
        self.engine.ensure_persistable(object)?;

        self.dispatcher.dispatch_pre_update(object, &mut change_set)?;
        if change_set.is_empty() {
            return Ok(false);
        }
        ensure_identifier_unchanged(&metadata, &snapshot, change_deltas(&change_set))?;
        let payload = self.engine.prepare_update_change_set(object, &change_set)?;
        if payload.is_empty() {
            return Ok(false);
        }
        ensure_identifier_unchanged(
            &metadata,
            &snapshot,
            payload.iter().map(|(f, v)| (f.as_str(), v)),
        )?;

        let identifier: RawData = metadata
            .identifier_fields()
            .iter()
            .filter_map(|f| snapshot.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        self.data_source(&class_name)?.update(&identifier, &payload)?;

        let mut persisted = snapshot;
        persisted.extend(payload);
        self.identity_map.update_snapshot(object, persisted)?;
        trace!(class = %class_name, fields = change_set.len(), "updated");

        self.dispatcher.dispatch_post_update(object)?;
        Ok(true)
    }

    fn execute_removal(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.dispatcher.dispatch_pre_remove(object)?;

        let class_name = object.class_name()?;
        let metadata = self.dispatcher.metadata().get(&class_name)?;
        let snapshot = self.identity_map.get_snapshot(object)?;
        let identifier: RawData = metadata
            .identifier_fields()
            .iter()
            .filter_map(|f| snapshot.get(f).map(|v| (f.clone(), v.clone())))
            .collect();

        self.data_source(&class_name)?.delete(&identifier)?;
        self.identity_map.evict(object)?;
        unschedule(&mut self.schedule()?.removals, object);
        trace!(class = %class_name, "removed");

        self.dispatcher.dispatch_post_remove(object)
    }
}

impl core::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (inserts, removals) = self
            .schedule
            .lock()
            .map(|s| (s.inserts.len(), s.removals.len()))
            .unwrap_or_default();
        f.debug_struct("UnitOfWork")
            .field("pending_inserts", &inserts)
            .field("pending_removals", &removals)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
