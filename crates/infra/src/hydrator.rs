//! Field-by-field hydrator.

use objmap_core::{MappedObject, MapperResult, ObjectHydrator, RawData};

/// Writes each raw attribute through the object's field setter, in row order.
///
/// A setter error aborts hydration; fields written before it stay written.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldHydrator;

impl ObjectHydrator for FieldHydrator {
    fn hydrate(&self, object: &mut dyn MappedObject, data: &RawData) -> MapperResult<()> {
        for (field, value) in data {
            object.set_field(field, value.clone())?;
        }
        Ok(())
    }
}
