use std::cmp::Ordering;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use objmap_core::{
    ClassMetadata, Criteria, IdentifierValue, MappedObject, MapperError, MapperResult, OrderBy,
    RawData, SortDirection, Value,
};

use super::r#trait::DataSource;
use crate::config::MapperConfig;

/// In-memory row store for one class.
///
/// Intended for tests/dev. Rows keep insertion order; `find_by` filters by
/// field equality, sorts on declared fields only, then pages.
#[derive(Debug)]
pub struct InMemoryDataSource {
    class_name: String,
    identifier: Vec<String>,
    fields: Vec<String>,
    max_page_size: Option<usize>,
    rows: RwLock<Vec<RawData>>,
    writes: AtomicUsize,
}

impl InMemoryDataSource {
    pub fn new(metadata: &ClassMetadata) -> Self {
        Self {
            class_name: metadata.class_name().to_string(),
            identifier: metadata.identifier_fields().to_vec(),
            fields: metadata.field_names().to_vec(),
            max_page_size: None,
            rows: RwLock::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Reject `find_by` limits above `max`.
    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = Some(max);
        self
    }

    /// Apply the page-size policy of `config`.
    pub fn with_config(mut self, config: &MapperConfig) -> Self {
        self.max_page_size = config.max_page_size;
        self
    }

    pub fn with_rows(self, rows: impl IntoIterator<Item = RawData>) -> MapperResult<Self> {
        self.rows_mut()?.extend(rows);
        Ok(self)
    }

    /// Put a row directly, bypassing the write counter (fixtures, or
    /// simulating an external writer).
    pub fn seed(&self, row: RawData) -> MapperResult<()> {
        self.rows_mut()?.push(row);
        Ok(())
    }

    /// Number of successful insert/update/delete calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    pub fn len(&self) -> MapperResult<usize> {
        Ok(self.rows()?.len())
    }

    pub fn is_empty(&self) -> MapperResult<bool> {
        Ok(self.len()? == 0)
    }

    fn rows(&self) -> MapperResult<std::sync::RwLockReadGuard<'_, Vec<RawData>>> {
        self.rows
            .read()
            .map_err(|_| MapperError::poisoned("in-memory data source"))
    }

    fn rows_mut(&self) -> MapperResult<std::sync::RwLockWriteGuard<'_, Vec<RawData>>> {
        self.rows
            .write()
            .map_err(|_| MapperError::poisoned("in-memory data source"))
    }

    /// Expand an id argument into `field -> value` identifier criteria.
    ///
    /// A single-field identifier takes the bare value; a composite one takes
    /// either an object keyed by field or an array in field order.
    fn id_criteria(&self, id: &Value) -> MapperResult<Criteria> {
        match (self.identifier.as_slice(), id) {
            ([field], _) => Ok([(field.clone(), id.clone())].into_iter().collect()),
            (fields, Value::Object(map)) => fields
                .iter()
                .map(|f| {
                    map.get(f)
                        .map(|v| (f.clone(), v.clone()))
                        .ok_or_else(|| {
                            MapperError::invalid_identity(format!("composite id lacks field '{f}'"))
                        })
                })
                .collect(),
            (fields, Value::Array(parts)) if parts.len() == fields.len() => Ok(fields
                .iter()
                .cloned()
                .zip(parts.iter().cloned())
                .collect()),
            _ => Err(MapperError::invalid_identity(format!(
                "{} requires a composite id over {:?}",
                self.class_name, self.identifier
            ))),
        }
    }

    fn same_identity(&self, row: &RawData, identifier: &RawData) -> bool {
        match (
            IdentifierValue::from_data(&self.identifier, row),
            IdentifierValue::from_data(&self.identifier, identifier),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn validate_order(&self, order_by: Option<&OrderBy>) -> MapperResult<()> {
        let Some(order_by) = order_by else {
            return Ok(());
        };
        for (field, _) in order_by.keys() {
            if !self.fields.contains(field) {
                return Err(MapperError::unsupported_criteria(format!(
                    "{} cannot be ordered by unmapped field '{field}'",
                    self.class_name
                )));
            }
        }
        Ok(())
    }

    fn validate_limit(&self, limit: Option<usize>) -> MapperResult<()> {
        match (limit, self.max_page_size) {
            (Some(limit), Some(max)) if limit > max => Err(MapperError::unsupported_criteria(
                format!("limit {limit} exceeds the maximum page size {max}"),
            )),
            _ => Ok(()),
        }
    }
}

fn matches(row: &RawData, criteria: &Criteria) -> bool {
    criteria
        .iter()
        .all(|(field, expected)| row.get(field).unwrap_or(&Value::Null) == expected)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_rows(a: &RawData, b: &RawData, order_by: &OrderBy) -> Ordering {
    for (field, direction) in order_by.keys() {
        let ord = compare_values(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        );
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl DataSource for InMemoryDataSource {
    fn find(&self, id: &Value) -> MapperResult<Option<RawData>> {
        let criteria = self.id_criteria(id)?;
        self.find_one_by(&criteria)
    }

    fn find_all(&self) -> MapperResult<Vec<RawData>> {
        Ok(self.rows()?.clone())
    }

    fn find_by(
        &self,
        criteria: &Criteria,
        order_by: Option<&OrderBy>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> MapperResult<Vec<RawData>> {
        self.validate_order(order_by)?;
        self.validate_limit(limit)?;

        let mut found: Vec<RawData> = self
            .rows()?
            .iter()
            .filter(|row| matches(row, criteria))
            .cloned()
            .collect();

        if let Some(order_by) = order_by.filter(|o| !o.is_empty()) {
            found.sort_by(|a, b| compare_rows(a, b, order_by));
        }

        Ok(found
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn find_one_by(&self, criteria: &Criteria) -> MapperResult<Option<RawData>> {
        Ok(self
            .rows()?
            .iter()
            .find(|row| matches(row, criteria))
            .cloned())
    }

    fn find_by_object(&self, object: &dyn MappedObject) -> MapperResult<Option<RawData>> {
        let identifier: RawData = self
            .identifier
            .iter()
            .map(|f| (f.clone(), object.get_field(f).unwrap_or(Value::Null)))
            .collect();
        IdentifierValue::from_data(&self.identifier, &identifier)?;
        self.find_one_by(&identifier)
    }

    fn insert(&self, data: &RawData) -> MapperResult<()> {
        IdentifierValue::from_data(&self.identifier, data)?;
        let mut rows = self.rows_mut()?;
        if rows.iter().any(|row| self.same_identity(row, data)) {
            return Err(MapperError::data_source(format!(
                "duplicate {} row for identifier {:?}",
                self.class_name,
                self.identifier
                    .iter()
                    .map(|f| data.get(f).cloned().unwrap_or(Value::Null))
                    .collect::<Vec<_>>()
            )));
        }
        rows.push(data.clone());
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    fn update(&self, identifier: &RawData, changes: &RawData) -> MapperResult<()> {
        let mut rows = self.rows_mut()?;
        let row = rows
            .iter_mut()
            .find(|row| self.same_identity(row, identifier))
            .ok_or_else(|| MapperError::not_found(format!("{} row {identifier:?}", self.class_name)))?;
        for (field, value) in changes {
            row.insert(field.clone(), value.clone());
        }
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    fn delete(&self, identifier: &RawData) -> MapperResult<()> {
        let mut rows = self.rows_mut()?;
        let before = rows.len();
        rows.retain(|row| !self.same_identity(row, identifier));
        if rows.len() == before {
            return Err(MapperError::not_found(format!(
                "{} row {identifier:?}",
                self.class_name
            )));
        }
        self.writes.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }
}
