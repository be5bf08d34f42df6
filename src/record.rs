//! Inventory record - a loosely typed JSON object
//!
//! Upstream data is not schema-checked, so any field may be absent or carry a
//! non-string value. Records keep every field they arrived with; resolution
//! and extraction only add or overwrite the fields they own.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known field names.
pub mod fields {
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const DESCRIPTION: &str = "description";
    pub const SOURCE_CATEGORY: &str = "source_category";
    pub const CATEGORY: &str = "category";
    pub const MAKE: &str = "make";
    pub const CANONICAL_MAKE: &str = "canonical_make";
    pub const MODEL: &str = "model";
    pub const EXTRACTED_FEATURES: &str = "extracted_features";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field's value if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}
