//! Constructor-registry object factory.

use std::collections::HashMap;
use std::sync::RwLock;

use objmap_core::{MappedObject, MapperError, MapperResult, ObjectFactory, ObjectHandle};

type Constructor = Box<dyn Fn() -> ObjectHandle + Send + Sync>;

/// Creates empty instances from per-class constructors.
#[derive(Default)]
pub struct RegistryObjectFactory {
    constructors: RwLock<HashMap<String, Constructor>>,
}

impl RegistryObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T::default()` as the constructor of `class_name`.
    pub fn register<T>(&self, class_name: impl Into<String>) -> MapperResult<()>
    where
        T: MappedObject + Default,
    {
        self.register_with(class_name, || ObjectHandle::new(T::default()))
    }

    pub fn register_with<F>(&self, class_name: impl Into<String>, constructor: F) -> MapperResult<()>
    where
        F: Fn() -> ObjectHandle + Send + Sync + 'static,
    {
        let mut constructors = self
            .constructors
            .write()
            .map_err(|_| MapperError::poisoned("object factory"))?;
        constructors.insert(class_name.into(), Box::new(constructor));
        Ok(())
    }
}

impl ObjectFactory for RegistryObjectFactory {
    fn create(&self, class_name: &str) -> MapperResult<ObjectHandle> {
        let constructors = self
            .constructors
            .read()
            .map_err(|_| MapperError::poisoned("object factory"))?;
        let constructor = constructors
            .get(class_name)
            .ok_or_else(|| MapperError::unknown_class(class_name))?;
        Ok(constructor())
    }
}

impl core::fmt::Debug for RegistryObjectFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut classes: Vec<String> = self
            .constructors
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        classes.sort_unstable();
        f.debug_struct("RegistryObjectFactory")
            .field("classes", &classes)
            .finish()
    }
}
