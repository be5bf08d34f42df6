//! Resolution policies - what differs between the category and manufacturer
//! instantiations of the canonicalization cache.
//!
//! The orchestrator is shared; a policy supplies the field names, the
//! normalizer, the optional vocabulary, and the rule for accepting one value
//! from an oracle answer.

use crate::error::{CanonError, Result};
use crate::normalize::{normalize_value, NormalizerKind};
use crate::record::{fields, Record};
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Written to the target field when a record's key is empty or unresolved.
pub const UNKNOWN: &str = "UNKNOWN";

/// Why an oracle-proposed value was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("value is not a string: {0}")]
    NotAString(Value),

    #[error("value is blank")]
    Blank,

    #[error("'{0}' is not in the taxonomy")]
    OutsideVocabulary(String),
}

pub trait ResolutionPolicy: Send + Sync {
    /// Label used in logs and run reports.
    fn name(&self) -> &str;

    /// Field holding the raw value.
    fn source_field(&self) -> &str;

    /// Field receiving the canonical value.
    fn target_field(&self) -> &str;

    fn normalizer(&self) -> NormalizerKind;

    fn normalize(&self, raw: &str) -> String {
        self.normalizer().normalize(raw)
    }

    /// Target vocabulary, if canonical values are constrained to one.
    fn vocabulary(&self) -> Option<&[String]>;

    /// Accept or refuse one oracle-proposed value, returning the value to store.
    fn validate(&self, value: &Value) -> std::result::Result<String, Rejection>;

    fn unknown_value(&self) -> &str {
        UNKNOWN
    }

    /// Normalized key for a record; empty when the raw value is absent or not a string.
    fn key_for(&self, record: &Record) -> String {
        normalize_value(self.normalizer(), record.get(self.source_field()))
    }
}

fn non_blank_string(value: &Value) -> std::result::Result<&str, Rejection> {
    let s = value.as_str().ok_or_else(|| Rejection::NotAString(value.clone()))?;
    let s = s.trim();
    if s.is_empty() {
        Err(Rejection::Blank)
    } else {
        Ok(s)
    }
}

/// Maps `source_category` onto a fixed taxonomy, writing `category`.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    vocabulary: Vec<String>,
    /// Lowercased, whitespace-collapsed taxonomy entry → its canonical spelling.
    lookup: HashMap<String, String>,
}

impl CategoryPolicy {
    pub fn new(vocabulary: Vec<String>) -> Result<Self> {
        let vocabulary: Vec<String> = vocabulary
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unique()
            .collect();

        if vocabulary.is_empty() {
            return Err(CanonError::Config("Category taxonomy is empty".to_string()));
        }

        let mut lookup = HashMap::new();
        for entry in &vocabulary {
            lookup.entry(fold(entry)).or_insert_with(|| entry.clone());
        }

        Ok(Self { vocabulary, lookup })
    }
}

fn fold(s: &str) -> String {
    s.split_whitespace().join(" ").to_lowercase()
}

impl ResolutionPolicy for CategoryPolicy {
    fn name(&self) -> &str {
        "category"
    }

    fn source_field(&self) -> &str {
        fields::SOURCE_CATEGORY
    }

    fn target_field(&self) -> &str {
        fields::CATEGORY
    }

    fn normalizer(&self) -> NormalizerKind {
        NormalizerKind::Category
    }

    fn vocabulary(&self) -> Option<&[String]> {
        Some(&self.vocabulary)
    }

    /// Only taxonomy members pass. Case and spacing differences are coerced to
    /// the taxonomy's own spelling.
    fn validate(&self, value: &Value) -> std::result::Result<String, Rejection> {
        let proposed = non_blank_string(value)?;
        self.lookup
            .get(&fold(proposed))
            .cloned()
            .ok_or_else(|| Rejection::OutsideVocabulary(proposed.to_string()))
    }
}

/// Free-form manufacturer canonicalization. Reads `make`, writes
/// `canonical_make`; the raw value is left as it arrived.
#[derive(Debug, Clone, Default)]
pub struct ManufacturerPolicy;

impl ManufacturerPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl ResolutionPolicy for ManufacturerPolicy {
    fn name(&self) -> &str {
        "manufacturer"
    }

    fn source_field(&self) -> &str {
        fields::MAKE
    }

    fn target_field(&self) -> &str {
        fields::CANONICAL_MAKE
    }

    fn normalizer(&self) -> NormalizerKind {
        NormalizerKind::Manufacturer
    }

    fn vocabulary(&self) -> Option<&[String]> {
        None
    }

    fn validate(&self, value: &Value) -> std::result::Result<String, Rejection> {
        non_blank_string(value).map(str::to_string)
    }
}
