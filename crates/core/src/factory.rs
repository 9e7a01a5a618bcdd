//! Object instantiation boundary.

use std::sync::Arc;

use crate::error::MapperResult;
use crate::object::ObjectHandle;

/// Produces empty instances of a mapped class.
pub trait ObjectFactory: Send + Sync {
    fn create(&self, class_name: &str) -> MapperResult<ObjectHandle>;
}

impl<F> ObjectFactory for Arc<F>
where
    F: ObjectFactory + ?Sized,
{
    fn create(&self, class_name: &str) -> MapperResult<ObjectHandle> {
        (**self).create(class_name)
    }
}
