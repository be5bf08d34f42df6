//! Normalizer - reduces free-text values to stable lookup keys
//!
//! Both instantiations lowercase, trim and collapse whitespace. They differ only
//! in which characters count as separators:
//! - Category: `-`, `/` and `_` become spaces.
//! - Manufacturer: every character that is not alphanumeric becomes a space,
//!   so `J. Deere`, `J Deere` and `j-deere` share the key `j deere`.
//!
//! Both functions are total: any input, including the empty string, yields a
//! key, and the empty key means "unknown".

use serde::{Deserialize, Serialize};

/// Which normalization rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    Category,
    Manufacturer,
}

impl NormalizerKind {
    pub fn normalize(self, raw: &str) -> String {
        match self {
            NormalizerKind::Category => normalize_category(raw),
            NormalizerKind::Manufacturer => normalize_manufacturer(raw),
        }
    }
}

pub fn normalize_category(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| if matches!(c, '-' | '/' | '_') { ' ' } else { c })
        .collect();
    collapse_whitespace(&spaced)
}

pub fn normalize_manufacturer(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let spaced: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&spaced)
}

/// Normalize an optional JSON value. Absent and non-string values become the
/// empty key.
pub fn normalize_value(kind: NormalizerKind, value: Option<&serde_json::Value>) -> String {
    match value.and_then(|v| v.as_str()) {
        Some(s) => kind.normalize(s),
        None => String::new(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_separators_and_case() {
        assert_eq!(normalize_category("  Wheel-Loaders "), "wheel loaders");
        assert_eq!(normalize_category("Skid_Steer/Track   Loader"), "skid steer track loader");
        assert_eq!(normalize_category("EXCAVATORS"), "excavators");
    }

    #[test]
    fn test_category_keeps_other_punctuation() {
        assert_eq!(normalize_category("Dozers (Crawler)"), "dozers (crawler)");
    }

    #[test]
    fn test_manufacturer_variants_share_key() {
        assert_eq!(normalize_manufacturer("J. Deere"), "j deere");
        assert_eq!(normalize_manufacturer("J Deere"), "j deere");
        assert_eq!(normalize_manufacturer("CAT"), "cat");
        assert_eq!(normalize_manufacturer("Caterpillar, Inc."), "caterpillar inc");
        assert_eq!(normalize_manufacturer("John-Deere"), normalize_manufacturer("John Deere"));
        assert_eq!(normalize_manufacturer("Case/New_Holland"), "case new holland");
    }

    #[test]
    fn test_empty_and_blank_inputs() {
        assert_eq!(normalize_category(""), "");
        assert_eq!(normalize_category("   "), "");
        assert_eq!(normalize_manufacturer("..."), "");
        assert_eq!(normalize_category("- / _"), "");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["Wheel-Loaders", "J. Deere", "  Mini   Excavator ", "CASE/IH"] {
            for kind in [NormalizerKind::Category, NormalizerKind::Manufacturer] {
                let once = kind.normalize(raw);
                assert_eq!(kind.normalize(&once), once);
            }
        }
    }

    #[test]
    fn test_non_string_values_are_empty() {
        let kind = NormalizerKind::Category;
        assert_eq!(normalize_value(kind, None), "");
        assert_eq!(normalize_value(kind, Some(&json!(42))), "");
        assert_eq!(normalize_value(kind, Some(&json!(null))), "");
        assert_eq!(normalize_value(kind, Some(&json!("Loaders"))), "loaders");
    }
}
