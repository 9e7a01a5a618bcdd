//! Object identity: (class name, identifier value).

use serde::{Deserialize, Serialize};

use crate::error::{MapperError, MapperResult};
use crate::object::MappedObject;
use crate::value::{RawData, Value};

/// Canonical identifier value, single or composite.
///
/// Each component is stored as its compact JSON encoding, so `1` and `"1"`
/// stay distinct identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierValue(Vec<String>);

impl IdentifierValue {
    /// Derive the identifier from raw data using the class's identifier fields.
    pub fn from_data(identifier_fields: &[String], data: &RawData) -> MapperResult<Self> {
        Self::collect(identifier_fields, |field| data.get(field).cloned())
    }

    /// Derive the identifier from an object's current field values.
    pub fn from_object(
        identifier_fields: &[String],
        object: &dyn MappedObject,
    ) -> MapperResult<Self> {
        Self::collect(identifier_fields, |field| object.get_field(field))
    }

    fn collect(
        identifier_fields: &[String],
        mut read: impl FnMut(&str) -> Option<Value>,
    ) -> MapperResult<Self> {
        if identifier_fields.is_empty() {
            return Err(MapperError::invalid_identity(
                "class declares no identifier fields",
            ));
        }

        let mut parts = Vec::with_capacity(identifier_fields.len());
        for field in identifier_fields {
            match read(field) {
                None | Some(Value::Null) => {
                    return Err(MapperError::invalid_identity(format!(
                        "identifier field '{field}' is missing or null"
                    )));
                }
                Some(Value::String(s)) if s.is_empty() => {
                    return Err(MapperError::invalid_identity(format!(
                        "identifier field '{field}' is empty"
                    )));
                }
                Some(v) => parts.push(v.to_string()),
            }
        }
        Ok(Self(parts))
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_composite(&self) -> bool {
        self.0.len() > 1
    }
}

impl core::fmt::Display for IdentifierValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_composite() {
            write!(f, "({})", self.0.join(", "))
        } else {
            f.write_str(self.0.first().map(String::as_str).unwrap_or_default())
        }
    }
}

/// Immutable (class, identifier) pair; the identity-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    class_name: String,
    identifier: IdentifierValue,
}

impl ObjectIdentity {
    pub fn new(class_name: impl Into<String>, identifier: IdentifierValue) -> Self {
        Self {
            class_name: class_name.into(),
            identifier,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn identifier(&self) -> &IdentifierValue {
        &self.identifier
    }
}

impl core::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.class_name, self.identifier)
    }
}
