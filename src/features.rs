//! Description feature extraction
//!
//! Stateless pattern matching over the uppercased description. Each extractor
//! checks its patterns in a fixed order and the first hit wins.

use crate::record::{fields, Record};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref HOURS: Regex = Regex::new(
        r"(?:HRS|HOURS|METER READS:?)\s*[:\-]?\s*(\d{1,3}(?:,\d{3})+|\d+)|(\d{1,3}(?:,\d{3})+|\d+)\s*(?:HRS|HOURS)"
    )
    .expect("valid hours pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cabin {
    #[serde(rename = "EROPS")]
    Erops,
    #[serde(rename = "OROPS")]
    Orops,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Drive {
    Tracks,
    #[serde(rename = "AWD")]
    Awd,
    #[serde(rename = "4WD")]
    FourWd,
    Wheels,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFeatures {
    pub cabin: Cabin,
    pub drive: Drive,
    pub hours: Option<u64>,
}

impl Default for ExtractedFeatures {
    fn default() -> Self {
        Self {
            cabin: Cabin::Unknown,
            drive: Drive::Unknown,
            hours: None,
        }
    }
}

pub fn extract_cabin(description: &str) -> Cabin {
    let desc = description.to_uppercase();
    if desc.contains("ENCLOSED CAB") || desc.contains("EROPS") {
        Cabin::Erops
    } else if desc.contains("OPEN STATION") || desc.contains("OROPS") {
        Cabin::Orops
    } else {
        Cabin::Unknown
    }
}

pub fn extract_drive(description: &str) -> Drive {
    let desc = description.to_uppercase();
    if desc.contains("TRACK") {
        Drive::Tracks
    } else if desc.contains("AWD") {
        Drive::Awd
    } else if desc.contains("4WD") || desc.contains("4X4") {
        Drive::FourWd
    } else if desc.contains("2WD") {
        Drive::Wheels
    } else {
        Drive::Unknown
    }
}

/// Operating hours, e.g. `1,250 HRS`, `HOURS: 980`, `METER READS 4,300`.
pub fn extract_hours(description: &str) -> Option<u64> {
    let desc = description.to_uppercase();
    let caps = HOURS.captures(&desc)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?.as_str().replace(',', "");
    digits.parse().ok()
}

pub fn extract_features(description: &str) -> ExtractedFeatures {
    ExtractedFeatures {
        cabin: extract_cabin(description),
        drive: extract_drive(description),
        hours: extract_hours(description),
    }
}

/// Attach `extracted_features` to every record. Missing or non-string
/// descriptions are treated as empty text.
pub fn extract_all(records: &mut [Record]) {
    for record in records.iter_mut() {
        let features = extract_features(record.get_str(fields::DESCRIPTION).unwrap_or(""));
        let value = serde_json::to_value(&features).unwrap_or(serde_json::Value::Null);
        record.set(fields::EXTRACTED_FEATURES, value);
    }
}
