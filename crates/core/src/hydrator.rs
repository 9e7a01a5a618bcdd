//! Raw data -> object boundary.

use std::sync::Arc;

use crate::error::MapperResult;
use crate::object::MappedObject;
use crate::value::RawData;

/// Copies a raw attribute mapping onto an object, in place.
pub trait ObjectHydrator: Send + Sync {
    fn hydrate(&self, object: &mut dyn MappedObject, data: &RawData) -> MapperResult<()>;
}

impl<H> ObjectHydrator for Arc<H>
where
    H: ObjectHydrator + ?Sized,
{
    fn hydrate(&self, object: &mut dyn MappedObject, data: &RawData) -> MapperResult<()> {
        (**self).hydrate(object, data)
    }
}
