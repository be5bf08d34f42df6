//! Inventory I/O - reading raw records and the taxonomy, writing JSON output

use crate::error::{CanonError, Result};
use crate::record::Record;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Read a JSON array of record objects.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CanonError::Inventory(format!("Failed to read {}: {}", path.display(), e)))?;
    let records = parse_records(serde_json::from_str(&content)?)?;
    info!("Loaded {} inventory records from {}", records.len(), path.display());
    Ok(records)
}

pub fn parse_records(value: Value) -> Result<Vec<Record>> {
    let Value::Array(items) = value else {
        return Err(CanonError::Inventory("Inventory must be a JSON array of objects".to_string()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            Record::try_from(item).map_err(|other| {
                CanonError::Inventory(format!("Inventory entry {} is not an object: {}", idx, other))
            })
        })
        .collect()
}

/// Read the category taxonomy.
pub fn load_taxonomy(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CanonError::Inventory(format!("Failed to read taxonomy {}: {}", path.display(), e)))?;
    let taxonomy = parse_taxonomy(serde_json::from_str(&content)?)?;
    info!("Loaded {} taxonomy categories from {}", taxonomy.len(), path.display());
    Ok(taxonomy)
}

/// Accepts either an array of strings or an object whose keys are the
/// categories. Object keys keep their file order.
pub fn parse_taxonomy(value: Value) -> Result<Vec<String>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(CanonError::Inventory(format!("Taxonomy entry is not a string: {}", other))),
            })
            .collect(),
        Value::Object(map) => Ok(map.into_iter().map(|(k, _)| k).collect()),
        other => Err(CanonError::Inventory(format!(
            "Taxonomy must be an array or object, got: {}",
            other
        ))),
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
