//! Per-class object repository (read path).
//!
//! A repository turns raw rows from its `DataSource` into live objects,
//! resolving every row through the identity map so that one identity never
//! has two instances.
//!
//! ## Get-or-create
//!
//! ```text
//! raw row
//!   ↓
//! 1. identity map hit? → return the mapped instance (row is discarded)
//!   ↓
//! 2. factory.create(class)
//!   ↓
//! 3. PreLoad (callbacks, then listeners; both may edit the row)
//!   ↓
//! 4. hydrate from the (edited) row
//!   ↓
//! 5. register_or_get(instance, row)  ← atomic; a racing loader may win
//!   ↓
//! 6. PostLoad, only for the instance that was registered
//! ```
//!
//! On a hit the fresh row is discarded: in-memory state wins over a re-read,
//! and external updates become visible only through `refresh` or after a
//! `clear`.
//!
//! Filtering, ordering and paging are the data source's job. The repository
//! never filters or sorts in memory, and an `UnsupportedCriteria` error from
//! the source reaches the caller unchanged.

use std::sync::Arc;

use tracing::{debug, trace};

use objmap_core::{
    Criteria, MapperError, MapperResult, ObjectFactory, ObjectHandle, ObjectHydrator, OrderBy,
    RawData, Value,
};
use objmap_events::EventDispatcher;

use crate::config::MapperConfig;
use crate::data_source::DataSource;
use crate::identity_map::IdentityMap;

pub struct ObjectRepository<D, F, H> {
    class_name: String,
    data_source: D,
    factory: F,
    hydrator: H,
    identity_map: Arc<IdentityMap>,
    dispatcher: Arc<EventDispatcher>,
    config: MapperConfig,
}

impl<D, F, H> ObjectRepository<D, F, H>
where
    D: DataSource,
    F: ObjectFactory,
    H: ObjectHydrator,
{
    /// Repository for `class_name`; fails with `UnknownClass` if the class has
    /// no registered metadata.
    pub fn new(
        class_name: impl Into<String>,
        data_source: D,
        factory: F,
        hydrator: H,
        identity_map: Arc<IdentityMap>,
        dispatcher: Arc<EventDispatcher>,
    ) -> MapperResult<Self> {
        let class_name = class_name.into();
        dispatcher.metadata().get(&class_name)?;
        Ok(Self {
            class_name,
            data_source,
            factory,
            hydrator,
            identity_map,
            dispatcher,
            config: MapperConfig::default(),
        })
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn data_source(&self) -> &D {
        &self.data_source
    }

    pub fn identity_map(&self) -> &Arc<IdentityMap> {
        &self.identity_map
    }

    pub fn find(&self, id: impl Into<Value>) -> MapperResult<Option<ObjectHandle>> {
        let id = id.into();
        match self.data_source.find(&id)? {
            Some(row) => self.get_or_create(row).map(Some),
            None => {
                trace!(class = %self.class_name, %id, "no row");
                Ok(None)
            }
        }
    }

    /// Every row of the class, in data-source order.
    pub fn find_all(&self) -> MapperResult<Vec<ObjectHandle>> {
        self.resolve_all(self.data_source.find_all()?)
    }

    pub fn find_by(
        &self,
        criteria: &Criteria,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> MapperResult<Vec<ObjectHandle>> {
        let rows = self.data_source.find_by(criteria, order_by, limit, offset)?;
        self.resolve_all(rows)
    }

    pub fn find_one_by(&self, criteria: &Criteria) -> MapperResult<Option<ObjectHandle>> {
        self.data_source
            .find_one_by(criteria)?
            .map(|row| self.get_or_create(row))
            .transpose()
    }

    /// Resolve a raw row to its one live instance, loading it if unmapped.
    pub fn get_or_create(&self, mut data: RawData) -> MapperResult<ObjectHandle> {
        if let Some(existing) = self.identity_map.try_get_by_id(&self.class_name, &data)? {
            trace!(class = %self.class_name, "identity map hit");
            return Ok(existing);
        }

        let object = self.factory.create(&self.class_name)?;
        self.load(&object, &mut data)?;

        let (object, inserted) = self.identity_map.register_or_get(object, data)?;
        if inserted {
            debug!(class = %self.class_name, "loaded");
            self.dispatcher.dispatch_post_load(&object)?;
        } else {
            debug!(class = %self.class_name, "lost load race; using mapped instance");
        }
        Ok(object)
    }

    /// Re-read the row of `object` and overwrite its fields in place.
    ///
    /// The snapshot is left alone: pending edits are discarded from the
    /// object, but the next change-set computation still compares against
    /// the last persisted state.
    ///
    /// A mapped object is re-read under its registered identity. If its
    /// identifier fields were edited in memory the call fails with
    /// `InvalidIdentity` and nothing is overwritten.
    pub fn refresh(&self, object: &ObjectHandle) -> MapperResult<()> {
        let class_name = object.class_name()?;
        if class_name != self.class_name {
            return Err(MapperError::not_managed(format!(
                "{class_name} object cannot be refreshed by the {} repository",
                self.class_name
            )));
        }

        let metadata = self.dispatcher.metadata().get(&self.class_name)?;
        let registered = self.identity_map.identity_of(object)?;
        let mut data = {
            let guard = object.read()?;
            if let Some(registered) = &registered {
                let current = metadata.identity_of(&*guard)?;
                if &current != registered {
                    return Err(MapperError::invalid_identity(format!(
                        "{registered} cannot be refreshed: identifier edited to {current}"
                    )));
                }
            }
            self.data_source.find_by_object(&*guard)?
        }
        .ok_or_else(|| MapperError::not_found(format!("{object:?} has no row")))?;

        if let Some(registered) = &registered {
            let fetched = metadata.identity_from_data(&data)?;
            if &fetched != registered {
                return Err(MapperError::invalid_identity(format!(
                    "refresh of {registered} returned the row of {fetched}"
                )));
            }
        }

        if self.config.refresh_fires_load_events {
            self.load(object, &mut data)?;
            self.dispatcher.dispatch_post_load(object)?;
        } else {
            let mut guard = object.write()?;
            self.hydrator.hydrate(&mut *guard, &data)?;
        }
        debug!(class = %self.class_name, "refreshed");
        Ok(())
    }

    /// PreLoad then hydrate. The object lock is not held across dispatch.
    fn load(&self, object: &ObjectHandle, data: &mut RawData) -> MapperResult<()> {
        self.dispatcher.dispatch_pre_load(object, data)?;
        let mut guard = object.write()?;
        self.hydrator.hydrate(&mut *guard, data)
    }

    fn resolve_all(&self, rows: Vec<RawData>) -> MapperResult<Vec<ObjectHandle>> {
        rows.into_iter().map(|row| self.get_or_create(row)).collect()
    }
}

impl<D, F, H> core::fmt::Debug for ObjectRepository<D, F, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectRepository")
            .field("class_name", &self.class_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
