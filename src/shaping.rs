//! Output shaping - selects the business-facing fields and drops everything
//! produced along the way.
//!
//! `make` is the canonical manufacturer when one was resolved, the raw value
//! otherwise.

use crate::error::Result;
use crate::features::ExtractedFeatures;
use crate::record::{fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub serial_number: Value,
    pub description: Value,
    pub category: Value,
    pub make: Value,
    pub model: Value,
    pub extracted_features: Value,
}

impl ProcessedRecord {
    pub fn from_record(record: &Record) -> Self {
        let field = |name: &str| record.get(name).cloned().unwrap_or(Value::Null);
        let extracted_features = match record.get(fields::EXTRACTED_FEATURES) {
            Some(features) => features.clone(),
            None => serde_json::to_value(ExtractedFeatures::default()).unwrap_or(Value::Null),
        };

        Self {
            serial_number: field(fields::SERIAL_NUMBER),
            description: field(fields::DESCRIPTION),
            category: field(fields::CATEGORY),
            make: record
                .get(fields::CANONICAL_MAKE)
                .or_else(|| record.get(fields::MAKE))
                .cloned()
                .unwrap_or(Value::Null),
            model: field(fields::MODEL),
            extracted_features,
        }
    }
}

pub fn shape(records: &[Record]) -> Vec<ProcessedRecord> {
    records.iter().map(ProcessedRecord::from_record).collect()
}

/// Shape `records` and write them as pretty JSON to `output_path`.
pub fn shape_and_write(records: &[Record], output_path: impl AsRef<Path>) -> Result<Vec<ProcessedRecord>> {
    let output_path = output_path.as_ref();
    let shaped = shape(records);
    crate::inventory::write_json(output_path, &shaped)?;
    info!("Wrote {} processed records to {}", shaped.len(), output_path.display());
    Ok(shaped)
}
