//! Object manager: the single entry point most callers need.
//!
//! Owns one of each collaborator and shares them between the per-class
//! repositories and the unit of work, so every read and write goes through
//! the same identity map and the same listeners.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use objmap_core::{
    ClassMetadata, ClassMetadataRegistry, MappedObject, MapperError, MapperResult, ObjectHandle,
    Value,
};
use objmap_events::{EventDispatcher, EventManager};

use crate::config::MapperConfig;
use crate::data_source::DataSource;
use crate::hydrator::FieldHydrator;
use crate::identity_map::IdentityMap;
use crate::object_factory::RegistryObjectFactory;
use crate::repository::ObjectRepository;
use crate::unit_of_work::{FlushReport, UnitOfWork};

/// Repository type handed out by [`ObjectManager`].
pub type ManagedRepository =
    ObjectRepository<Arc<dyn DataSource>, Arc<RegistryObjectFactory>, FieldHydrator>;

pub struct ObjectManager {
    metadata: Arc<ClassMetadataRegistry>,
    events: Arc<EventManager>,
    dispatcher: Arc<EventDispatcher>,
    identity_map: Arc<IdentityMap>,
    factory: Arc<RegistryObjectFactory>,
    unit_of_work: UnitOfWork,
    repositories: RwLock<HashMap<String, Arc<ManagedRepository>>>,
    config: MapperConfig,
}

impl ObjectManager {
    pub fn new(config: MapperConfig) -> Self {
        let metadata = Arc::new(ClassMetadataRegistry::new());
        let events = Arc::new(EventManager::new());
        let dispatcher = Arc::new(EventDispatcher::new(metadata.clone(), events.clone()));
        let identity_map = Arc::new(IdentityMap::new(dispatcher.clone()));
        let unit_of_work = UnitOfWork::new(identity_map.clone(), dispatcher.clone())
            .with_config(config.clone());

        info!(name = %config.name, "object manager created");
        Self {
            metadata,
            events,
            dispatcher,
            identity_map,
            factory: Arc::new(RegistryObjectFactory::new()),
            unit_of_work,
            repositories: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Map class `T` with `metadata`, backed by `data_source`.
    ///
    /// New instances are built with `T::default()` and hydrated field by
    /// field.
    pub fn register_class<T>(
        &self,
        metadata: ClassMetadata,
        data_source: Arc<dyn DataSource>,
    ) -> MapperResult<Arc<ManagedRepository>>
    where
        T: MappedObject + Default,
    {
        let class_name = metadata.class_name().to_string();
        self.metadata.register(metadata)?;
        self.factory.register::<T>(class_name.clone())?;
        self.unit_of_work
            .register_data_source(class_name.clone(), data_source.clone())?;

        let repository = Arc::new(
            ObjectRepository::new(
                class_name.clone(),
                data_source,
                self.factory.clone(),
                FieldHydrator,
                self.identity_map.clone(),
                self.dispatcher.clone(),
            )?
            .with_config(self.config.clone()),
        );
        self.repositories
            .write()
            .map_err(|_| MapperError::poisoned("object manager repositories"))?
            .insert(class_name.clone(), repository.clone());

        info!(class = %class_name, "class registered");
        Ok(repository)
    }

    pub fn repository(&self, class_name: &str) -> MapperResult<Arc<ManagedRepository>> {
        self.repositories
            .read()
            .map_err(|_| MapperError::poisoned("object manager repositories"))?
            .get(class_name)
            .cloned()
            .ok_or_else(|| MapperError::unknown_class(class_name))
    }

    pub fn find(&self, class_name: &str, id: impl Into<Value>) -> MapperResult<Option<ObjectHandle>> {
        self.repository(class_name)?.find(id)
    }

    pub fn persist(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.unit_of_work.persist(object)
    }

    pub fn remove(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.unit_of_work.remove(object)
    }

    pub fn flush(&self) -> MapperResult<FlushReport> {
        self.unit_of_work.flush()
    }

    /// Detach every object of `class_name`, or everything; pending work for
    /// the detached objects is dropped.
    pub fn clear(&self, class_name: Option<&str>) -> MapperResult<usize> {
        self.unit_of_work.clear(class_name)
    }

    pub fn refresh(&self, object: &ObjectHandle) -> MapperResult<()> {
        self.repository(&object.class_name()?)?.refresh(object)
    }

    pub fn contains(&self, object: &ObjectHandle) -> MapperResult<bool> {
        self.unit_of_work.contains(object)
    }

    pub fn event_manager(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn metadata(&self) -> &Arc<ClassMetadataRegistry> {
        &self.metadata
    }

    pub fn identity_map(&self) -> &Arc<IdentityMap> {
        &self.identity_map
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

impl core::fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectManager")
            .field("config", &self.config)
            .field("managed", &self.identity_map.len().ok())
            .field("unit_of_work", &self.unit_of_work)
            .finish_non_exhaustive()
    }
}
