use std::sync::Arc;

use objmap_core::{Criteria, MappedObject, MapperResult, OrderBy, RawData, Value};

/// Row/document source for one mapped class.
///
/// The read side is what repositories consume; the write side is what the
/// unit of work calls during a flush. Implementations own the storage shape
/// and all IO, including any timeout or retry policy.
///
/// ## Read semantics
///
/// - `find`/`find_one_by`/`find_by_object` return `None` when nothing matches
/// - `find_all`/`find_by` return rows in the source's own order; the mapper
///   never re-sorts or filters them in memory
/// - `find_by` must fail with `UnsupportedCriteria` when it cannot honor an
///   ordering or paging request, rather than silently ignore it
///
/// ## Write semantics
///
/// Rows are addressed by their identifier fields (`identifier` mappings hold
/// exactly those fields). Writes either fully succeed or return an error.
pub trait DataSource: Send + Sync {
    fn find(&self, id: &Value) -> MapperResult<Option<RawData>>;

    fn find_all(&self) -> MapperResult<Vec<RawData>>;

    fn find_by(
        &self,
        criteria: &Criteria,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> MapperResult<Vec<RawData>>;

    fn find_one_by(&self, criteria: &Criteria) -> MapperResult<Option<RawData>>;

    /// Re-read the row of an object, addressed by the object's identifier.
    fn find_by_object(&self, object: &dyn MappedObject) -> MapperResult<Option<RawData>>;

    fn insert(&self, data: &RawData) -> MapperResult<()>;

    fn update(&self, identifier: &RawData, changes: &RawData) -> MapperResult<()>;

    fn delete(&self, identifier: &RawData) -> MapperResult<()>;
}

impl<S> DataSource for Arc<S>
where
    S: DataSource + ?Sized,
{
    fn find(&self, id: &Value) -> MapperResult<Option<RawData>> {
        (**self).find(id)
    }

    fn find_all(&self) -> MapperResult<Vec<RawData>> {
        (**self).find_all()
    }

    fn find_by(
        &self,
        criteria: &Criteria,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> MapperResult<Vec<RawData>> {
        (**self).find_by(criteria, order_by, limit, offset)
    }

    fn find_one_by(&self, criteria: &Criteria) -> MapperResult<Option<RawData>> {
        (**self).find_one_by(criteria)
    }

    fn find_by_object(&self, object: &dyn MappedObject) -> MapperResult<Option<RawData>> {
        (**self).find_by_object(object)
    }

    fn insert(&self, data: &RawData) -> MapperResult<()> {
        (**self).insert(data)
    }

    fn update(&self, identifier: &RawData, changes: &RawData) -> MapperResult<()> {
        (**self).update(identifier, changes)
    }

    fn delete(&self, identifier: &RawData) -> MapperResult<()> {
        (**self).delete(identifier)
    }
}
