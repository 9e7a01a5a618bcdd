//! Shared fixtures for the infra unit tests.

use std::sync::Arc;

use serde_json::json;

use objmap_core::{
    ClassMetadata, ClassMetadataBuilder, ClassMetadataRegistry, MappedObject, MapperError,
    MapperResult, Persistable, RawData, Value, raw_data,
};
use objmap_events::{EventDispatcher, EventManager};

use crate::change_set_engine::ChangeSetEngine;
use crate::config::MapperConfig;
use crate::data_source::{DataSource, InMemoryDataSource};
use crate::hydrator::FieldHydrator;
use crate::identity_map::IdentityMap;
use crate::object_factory::RegistryObjectFactory;
use crate::repository::ObjectRepository;
use crate::unit_of_work::UnitOfWork;

/// Persistable test model.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: None,
        }
    }

    pub fn from_row(row: &RawData) -> Self {
        let mut user = Self::default();
        for (field, value) in row {
            let _ = user.set_field(field, value.clone());
        }
        user
    }
}

impl MappedObject for User {
    fn class_name(&self) -> &str {
        "User"
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(json!(self.id)),
            "name" => Some(json!(self.name)),
            "email" => Some(json!(self.email)),
            _ => None,
        }
    }

    fn set_field(&mut self, field: &str, value: Value) -> MapperResult<()> {
        match (field, value) {
            ("id", Value::Number(n)) => {
                self.id = n
                    .as_i64()
                    .ok_or_else(|| MapperError::hydration("User.id must be an integer"))?;
            }
            ("name", Value::String(s)) => self.name = s,
            ("email", Value::String(s)) => self.email = Some(s),
            ("email", Value::Null) => self.email = None,
            (field, value) => {
                return Err(MapperError::hydration(format!(
                    "User.{field} cannot hold {value}"
                )));
            }
        }
        Ok(())
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Persistable for User {
    fn prepare_persist_change_set(&self) -> RawData {
        raw_data([
            ("id", json!(self.id)),
            ("name", json!(self.name)),
            ("email", json!(self.email)),
        ])
    }
}

/// Read-only test model keyed by `name`; not persistable.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Tag {
    pub name: String,
    pub uses: i64,
}

impl Tag {
    pub fn from_row(row: &RawData) -> Self {
        let mut tag = Self::default();
        for (field, value) in row {
            let _ = tag.set_field(field, value.clone());
        }
        tag
    }
}

impl MappedObject for Tag {
    fn class_name(&self) -> &str {
        "Tag"
    }

    fn get_field(&self, field: &str) -> Option<Value> {
        match field {
            "name" => Some(json!(self.name)),
            "uses" => Some(json!(self.uses)),
            _ => None,
        }
    }

    fn set_field(&mut self, field: &str, value: Value) -> MapperResult<()> {
        match field {
            "name" => self.name = value.as_str().unwrap_or_default().to_string(),
            "uses" => self.uses = value.as_i64().unwrap_or_default(),
            other => return Err(MapperError::hydration(format!("Tag.{other}"))),
        }
        Ok(())
    }
}

pub(crate) fn user_metadata() -> ClassMetadataBuilder {
    ClassMetadata::builder("User")
        .fields(["id", "name", "email"])
        .identifier(["id"])
}

pub(crate) fn tag_metadata() -> ClassMetadataBuilder {
    ClassMetadata::builder("Tag")
        .fields(["name", "uses"])
        .identifier(["name"])
}

pub(crate) fn user_row(id: i64, name: &str) -> RawData {
    raw_data([
        ("id", json!(id)),
        ("name", json!(name)),
        ("email", Value::Null),
    ])
}

pub(crate) fn tag_row(name: &str) -> RawData {
    raw_data([("name", json!(name)), ("uses", json!(0))])
}

pub(crate) type TestRepository =
    ObjectRepository<Arc<InMemoryDataSource>, Arc<RegistryObjectFactory>, FieldHydrator>;

/// Fully wired collaborators over two in-memory tables.
pub(crate) struct Fixture {
    pub registry: Arc<ClassMetadataRegistry>,
    pub events: Arc<EventManager>,
    pub dispatcher: Arc<EventDispatcher>,
    pub identity_map: Arc<IdentityMap>,
    pub factory: Arc<RegistryObjectFactory>,
    pub users: Arc<InMemoryDataSource>,
    pub tags: Arc<InMemoryDataSource>,
    pub config: MapperConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_user_metadata(user_metadata())
    }

    pub fn with_user_metadata(user: ClassMetadataBuilder) -> Self {
        Self::build(user, MapperConfig::default())
    }

    pub fn build(user: ClassMetadataBuilder, config: MapperConfig) -> Self {
        let registry = Arc::new(ClassMetadataRegistry::new());
        let user = registry.register(user.build().unwrap()).unwrap();
        let tag = registry.register(tag_metadata().build().unwrap()).unwrap();

        let events = Arc::new(EventManager::new());
        let dispatcher = Arc::new(EventDispatcher::new(registry.clone(), events.clone()));
        let identity_map = Arc::new(IdentityMap::new(dispatcher.clone()));

        let factory = Arc::new(RegistryObjectFactory::new());
        factory.register::<User>("User").unwrap();
        factory.register::<Tag>("Tag").unwrap();

        Self {
            registry,
            events,
            dispatcher,
            identity_map,
            factory,
            users: Arc::new(InMemoryDataSource::new(&user)),
            tags: Arc::new(InMemoryDataSource::new(&tag)),
            config,
        }
    }

    pub fn seed_users(&self, rows: impl IntoIterator<Item = RawData>) {
        for row in rows {
            self.users.seed(row).unwrap();
        }
    }

    pub fn repository(&self, class_name: &str) -> TestRepository {
        let data_source = match class_name {
            "Tag" => self.tags.clone(),
            _ => self.users.clone(),
        };
        ObjectRepository::new(
            class_name,
            data_source,
            self.factory.clone(),
            FieldHydrator,
            self.identity_map.clone(),
            self.dispatcher.clone(),
        )
        .unwrap()
        .with_config(self.config.clone())
    }

    pub fn users_repository(&self) -> TestRepository {
        self.repository("User")
    }

    pub fn engine(&self) -> ChangeSetEngine {
        ChangeSetEngine::new(self.registry.clone())
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        let uow = UnitOfWork::new(self.identity_map.clone(), self.dispatcher.clone())
            .with_config(self.config.clone());
        uow.register_data_source("User", self.users.clone() as Arc<dyn DataSource>)
            .unwrap();
        uow.register_data_source("Tag", self.tags.clone() as Arc<dyn DataSource>)
            .unwrap();
        uow
    }
}
