//! `objmap-core`: persistence-coordination building blocks.
//!
//! This crate contains the mapper's vocabulary (no orchestration, no IO):
//! values, identities, mapped objects, change sets, lifecycle events, class
//! metadata and the collaborator interfaces the core consumes.

pub mod change_set;
pub mod error;
pub mod factory;
pub mod hydrator;
pub mod identity;
pub mod lifecycle;
pub mod metadata;
pub mod object;
pub mod persistable;
pub mod value;

pub use change_set::{Change, ChangeSet};
pub use error::{MapperError, MapperResult};
pub use factory::ObjectFactory;
pub use hydrator::ObjectHydrator;
pub use identity::{IdentifierValue, ObjectIdentity};
pub use lifecycle::LifecycleEvent;
pub use metadata::{
    ClassMetadata, ClassMetadataBuilder, ClassMetadataRegistry, LifecycleCallback, Payload,
};
pub use object::{AsAny, MappedObject, ObjectHandle, ObjectKey};
pub use persistable::Persistable;
pub use value::{Criteria, OrderBy, RawData, SortDirection, Value, raw_data};
