//! Class metadata: field lists, identifier rule and lifecycle-callback tables.
//!
//! Callbacks are resolved once, when a class is registered, into a table of
//! `event -> ordered callbacks`. Dispatch then only looks the event up; there
//! is no per-call reflection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::change_set::ChangeSet;
use crate::error::{MapperError, MapperResult};
use crate::identity::{IdentifierValue, ObjectIdentity};
use crate::lifecycle::LifecycleEvent;
use crate::object::MappedObject;
use crate::value::{RawData, Value};

/// Mutable in-flight data handed through a dispatch pipeline.
///
/// A single payload is borrowed exclusively by each stage in turn (callbacks,
/// then listeners), so edits made by an earlier stage are what later stages
/// see.
#[derive(Debug, Default)]
pub enum Payload<'a> {
    #[default]
    None,
    /// Computed change set of a `PreUpdate`.
    ChangeSet(&'a mut ChangeSet),
    /// Raw row data of a `PreLoad`, before hydration.
    RawData(&'a mut RawData),
}

impl<'a> Payload<'a> {
    pub fn change_set(&self) -> Option<&ChangeSet> {
        match self {
            Payload::ChangeSet(cs) => Some(cs),
            _ => None,
        }
    }

    pub fn change_set_mut(&mut self) -> Option<&mut ChangeSet> {
        match self {
            Payload::ChangeSet(cs) => Some(cs),
            _ => None,
        }
    }

    pub fn raw_data(&self) -> Option<&RawData> {
        match self {
            Payload::RawData(data) => Some(data),
            _ => None,
        }
    }

    pub fn raw_data_mut(&mut self) -> Option<&mut RawData> {
        match self {
            Payload::RawData(data) => Some(data),
            _ => None,
        }
    }

    /// Reborrow for a shorter-lived stage without giving up the payload.
    pub fn reborrow(&mut self) -> Payload<'_> {
        match self {
            Payload::None => Payload::None,
            Payload::ChangeSet(cs) => Payload::ChangeSet(cs),
            Payload::RawData(data) => Payload::RawData(data),
        }
    }
}

/// Per-class lifecycle callback.
pub type LifecycleCallback =
    Arc<dyn Fn(&mut dyn MappedObject, &mut Payload<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Mapping metadata for one class.
pub struct ClassMetadata {
    class_name: String,
    identifier: Vec<String>,
    fields: Vec<String>,
    callbacks: HashMap<LifecycleEvent, Vec<LifecycleCallback>>,
}

impl ClassMetadata {
    pub fn builder(class_name: impl Into<String>) -> ClassMetadataBuilder {
        ClassMetadataBuilder::new(class_name)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn identifier_fields(&self) -> &[String] {
        &self.identifier
    }

    /// Mapped fields in declaration order.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn has_lifecycle_callbacks(&self, event: LifecycleEvent) -> bool {
        self.callbacks.get(&event).is_some_and(|cbs| !cbs.is_empty())
    }

    /// Run every callback registered for `event`, in registration order.
    ///
    /// The first failing callback stops the chain; its error is returned as is.
    pub fn invoke_lifecycle_callbacks(
        &self,
        event: LifecycleEvent,
        object: &mut dyn MappedObject,
        payload: &mut Payload<'_>,
    ) -> MapperResult<()> {
        let Some(callbacks) = self.callbacks.get(&event) else {
            return Ok(());
        };
        for callback in callbacks {
            callback(&mut *object, &mut *payload)?;
        }
        Ok(())
    }

    pub fn identity_from_data(&self, data: &RawData) -> MapperResult<ObjectIdentity> {
        let id = IdentifierValue::from_data(&self.identifier, data)?;
        Ok(ObjectIdentity::new(self.class_name.clone(), id))
    }

    pub fn identity_of(&self, object: &dyn MappedObject) -> MapperResult<ObjectIdentity> {
        let id = IdentifierValue::from_object(&self.identifier, object)?;
        Ok(ObjectIdentity::new(self.class_name.clone(), id))
    }

    /// Current values of every mapped field the object exposes, in
    /// declaration order.
    pub fn field_values(&self, object: &dyn MappedObject) -> RawData {
        self.fields
            .iter()
            .filter_map(|field| object.get_field(field).map(|v| (field.clone(), v)))
            .collect()
    }

    /// Identifier fields and values of an object, for addressing writes.
    pub fn identifier_values(&self, object: &dyn MappedObject) -> RawData {
        self.identifier
            .iter()
            .map(|field| (field.clone(), object.get_field(field).unwrap_or(Value::Null)))
            .collect()
    }
}

impl core::fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut events: Vec<_> = self.callbacks.keys().map(|e| e.name()).collect();
        events.sort_unstable();
        f.debug_struct("ClassMetadata")
            .field("class_name", &self.class_name)
            .field("identifier", &self.identifier)
            .field("fields", &self.fields)
            .field("callbacks", &events)
            .finish()
    }
}

/// Builder for [`ClassMetadata`].
pub struct ClassMetadataBuilder {
    class_name: String,
    identifier: Vec<String>,
    fields: Vec<String>,
    callbacks: HashMap<LifecycleEvent, Vec<LifecycleCallback>>,
}

impl ClassMetadataBuilder {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            identifier: Vec::new(),
            fields: Vec::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Identifier field(s); more than one makes a composite key.
    pub fn identifier<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifier = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.fields.contains(&name) {
            self.fields.push(name);
        }
        self
    }

    pub fn fields<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |b, name| b.field(name))
    }

    /// Register an untyped callback for `event`.
    pub fn lifecycle_callback<F>(mut self, event: LifecycleEvent, callback: F) -> Self
    where
        F: Fn(&mut dyn MappedObject, &mut Payload<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks
            .entry(event)
            .or_default()
            .push(Arc::new(callback));
        self
    }

    /// Register a callback that receives the object as its concrete type.
    pub fn on<T, F>(self, event: LifecycleEvent, callback: F) -> Self
    where
        T: MappedObject,
        F: Fn(&mut T, &mut Payload<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let class_name = self.class_name.clone();
        self.lifecycle_callback(event, move |object, payload| {
            let typed = object.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
                anyhow::anyhow!("{event} callback of '{class_name}' received an object of another type")
            })?;
            callback(typed, payload)
        })
    }

    pub fn build(self) -> MapperResult<ClassMetadata> {
        if self.identifier.is_empty() {
            return Err(MapperError::invalid_identity(format!(
                "class '{}' declares no identifier fields",
                self.class_name
            )));
        }
        if let Some(missing) = self.identifier.iter().find(|f| !self.fields.contains(f)) {
            return Err(MapperError::invalid_identity(format!(
                "identifier field '{missing}' of class '{}' is not a mapped field",
                self.class_name
            )));
        }

        Ok(ClassMetadata {
            class_name: self.class_name,
            identifier: self.identifier,
            fields: self.fields,
            callbacks: self.callbacks,
        })
    }
}

/// Registry of class metadata, keyed by class name.
#[derive(Debug, Default)]
pub struct ClassMetadataRegistry {
    classes: RwLock<HashMap<String, Arc<ClassMetadata>>>,
}

impl ClassMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the metadata of a class.
    pub fn register(&self, metadata: ClassMetadata) -> MapperResult<Arc<ClassMetadata>> {
        let metadata = Arc::new(metadata);
        let mut classes = self
            .classes
            .write()
            .map_err(|_| MapperError::poisoned("metadata registry"))?;
        debug!(class = metadata.class_name(), "registered class metadata");
        classes.insert(metadata.class_name().to_string(), metadata.clone());
        Ok(metadata)
    }

    pub fn get(&self, class_name: &str) -> MapperResult<Arc<ClassMetadata>> {
        self.try_get(class_name)?
            .ok_or_else(|| MapperError::unknown_class(class_name))
    }

    pub fn try_get(&self, class_name: &str) -> MapperResult<Option<Arc<ClassMetadata>>> {
        let classes = self
            .classes
            .read()
            .map_err(|_| MapperError::poisoned("metadata registry"))?;
        Ok(classes.get(class_name).cloned())
    }

    pub fn class_names(&self) -> MapperResult<Vec<String>> {
        let classes = self
            .classes
            .read()
            .map_err(|_| MapperError::poisoned("metadata registry"))?;
        let mut names: Vec<_> = classes.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}
