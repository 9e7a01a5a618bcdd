//! Attribute values and the shapes built from them.
//!
//! Raw data is whatever the data source hands back for one row/document: an
//! ordered mapping from field name to value. The same shape is used for
//! snapshots, criteria and write payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single attribute value.
pub type Value = serde_json::Value;

/// Ordered attribute mapping (field name -> value).
pub type RawData = IndexMap<String, Value>;

/// Equality criteria (field name -> expected value).
pub type Criteria = IndexMap<String, Value>;

/// Sort direction for one ordering key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering requested from a data source, applied key by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBy(Vec<(String, SortDirection)>);

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortDirection::Asc));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortDirection::Desc));
        self
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build a `RawData` mapping from `(field, value)` pairs.
pub fn raw_data<K, V, I>(pairs: I) -> RawData
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
