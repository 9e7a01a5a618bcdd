//! Persistence coordination: identity map, repositories, change sets and
//! the unit of work, over pluggable data sources.

pub mod change_set_engine;
pub mod config;
pub mod data_source;
pub mod hydrator;
pub mod identity_map;
pub mod manager;
pub mod object_factory;
pub mod repository;
pub mod unit_of_work;

mod integration_tests;

#[cfg(test)]
mod testing;

pub use change_set_engine::ChangeSetEngine;
pub use config::MapperConfig;
pub use data_source::{DataSource, InMemoryDataSource};
pub use hydrator::FieldHydrator;
pub use identity_map::IdentityMap;
pub use manager::{ManagedRepository, ObjectManager};
pub use object_factory::RegistryObjectFactory;
pub use repository::ObjectRepository;
pub use unit_of_work::{FlushReport, UnitOfWork};
