//! Domain objects as seen by the mapper, and the shared handle to them.

use std::any::Any;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{MapperError, MapperResult};
use crate::persistable::Persistable;
use crate::value::Value;

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An in-memory domain object the mapper can track.
///
/// Field access is by name; the class metadata decides which names exist and
/// in which order they are read.
pub trait MappedObject: AsAny + Send + Sync + core::fmt::Debug {
    /// Class (type tag) this object is mapped as.
    fn class_name(&self) -> &str;

    /// Current value of a field, `None` if the object has no such field.
    fn get_field(&self, field: &str) -> Option<Value>;

    /// Overwrite a field with a raw value.
    fn set_field(&mut self, field: &str, value: Value) -> MapperResult<()>;

    /// The `Persistable` capability, if this object implements it.
    fn as_persistable(&self) -> Option<&dyn Persistable> {
        None
    }
}

/// Stable address of a live instance, usable as a map key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(usize);

/// Shared, reference-counted handle to a mapped object.
///
/// Clones point at the same instance. Dropping the identity map's binding
/// never frees an instance that a caller still holds.
#[derive(Clone)]
pub struct ObjectHandle {
    inner: Arc<RwLock<dyn MappedObject>>,
}

impl ObjectHandle {
    pub fn new<T: MappedObject>(object: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(object)),
        }
    }

    pub fn read(&self) -> MapperResult<RwLockReadGuard<'_, dyn MappedObject>> {
        self.inner
            .read()
            .map_err(|_| MapperError::poisoned("object read lock"))
    }

    pub fn write(&self) -> MapperResult<RwLockWriteGuard<'_, dyn MappedObject>> {
        self.inner
            .write()
            .map_err(|_| MapperError::poisoned("object write lock"))
    }

    pub fn class_name(&self) -> MapperResult<String> {
        Ok(self.read()?.class_name().to_string())
    }

    /// Reference equality: both handles point at the same instance.
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    /// Number of live handles to this instance.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Borrow the object as its concrete type.
    pub fn with<T, R>(&self, f: impl FnOnce(&T) -> R) -> MapperResult<R>
    where
        T: MappedObject,
    {
        let guard = self.read()?;
        let object: &dyn MappedObject = &*guard;
        let class_name = object.class_name().to_string();
        object
            .as_any()
            .downcast_ref::<T>()
            .map(f)
            .ok_or_else(|| MapperError::hydration(format!("'{class_name}' is not the requested type")))
    }

    /// Mutably borrow the object as its concrete type.
    pub fn with_mut<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> MapperResult<R>
    where
        T: MappedObject,
    {
        let mut guard = self.write()?;
        let object: &mut dyn MappedObject = &mut *guard;
        let class_name = object.class_name().to_string();
        object
            .as_any_mut()
            .downcast_mut::<T>()
            .map(f)
            .ok_or_else(|| MapperError::hydration(format!("'{class_name}' is not the requested type")))
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectHandle {}

impl core::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.inner.try_read() {
            Ok(object) => f
                .debug_struct("ObjectHandle")
                .field("class", &object.class_name())
                .field("key", &self.key())
                .finish(),
            Err(_) => f
                .debug_struct("ObjectHandle")
                .field("key", &self.key())
                .finish_non_exhaustive(),
        }
    }
}
