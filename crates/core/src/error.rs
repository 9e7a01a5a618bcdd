//! Mapper error model.

use thiserror::Error;

/// Result type used across the mapper.
pub type MapperResult<T> = Result<T, MapperError>;

/// Mapper-level error.
///
/// The first four variants are the failures the persistence core itself
/// detects. `Callback` carries whatever a lifecycle callback or listener
/// returned, untouched, so callers can downcast it back to their own type.
#[derive(Debug, Error)]
pub enum MapperError {
    /// The identity is already bound to a different live instance.
    #[error("identity conflict: {0} is already bound to a different instance")]
    IdentityConflict(String),

    /// An identifier was missing, null or empty.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// The object does not expose the `Persistable` capability.
    #[error("object of class '{0}' is not persistable")]
    NotPersistable(String),

    /// The data source cannot honor the requested ordering/paging.
    #[error("unsupported criteria: {0}")]
    UnsupportedCriteria(String),

    /// No class metadata was registered for the class name.
    #[error("no class metadata registered for '{0}'")]
    UnknownClass(String),

    /// The object is not held by the identity map.
    #[error("object is not managed: {0}")]
    NotManaged(String),

    /// The data source has no row for a managed object.
    #[error("not found: {0}")]
    NotFound(String),

    /// A field could not be written onto an object.
    #[error("hydration failed: {0}")]
    Hydration(String),

    /// Opaque failure reported by a data source.
    #[error("data source failure: {0}")]
    DataSource(String),

    /// Internal lock poisoning.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// Error raised by a lifecycle callback or event listener.
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl MapperError {
    pub fn identity_conflict(msg: impl Into<String>) -> Self {
        Self::IdentityConflict(msg.into())
    }

    pub fn invalid_identity(msg: impl Into<String>) -> Self {
        Self::InvalidIdentity(msg.into())
    }

    pub fn not_persistable(class_name: impl Into<String>) -> Self {
        Self::NotPersistable(class_name.into())
    }

    pub fn unsupported_criteria(msg: impl Into<String>) -> Self {
        Self::UnsupportedCriteria(msg.into())
    }

    pub fn unknown_class(class_name: impl Into<String>) -> Self {
        Self::UnknownClass(class_name.into())
    }

    pub fn not_managed(msg: impl Into<String>) -> Self {
        Self::NotManaged(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn hydration(msg: impl Into<String>) -> Self {
        Self::Hydration(msg.into())
    }

    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::DataSource(msg.into())
    }

    pub fn poisoned(what: impl Into<String>) -> Self {
        Self::Poisoned(what.into())
    }

    /// Returns the callback/listener error if this is one.
    pub fn as_callback(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Callback(err) => Some(err),
            _ => None,
        }
    }
}
