//! Prompt templates for the two resolution domains.

use std::collections::BTreeSet;

pub fn category_prompt(keys: &BTreeSet<String>, vocabulary: &[String]) -> String {
    format!(
        r#"You are a heavy equipment classification expert.

Map each source category to exactly ONE category from the taxonomy list.

Rules:
- Use ONLY taxonomy values, spelled exactly as listed
- Return valid JSON with double quotes
- One entry per source category, keyed by the source category as given
- No explanations

SOURCE CATEGORIES:
{}

TAXONOMY:
{}

OUTPUT FORMAT:
{{"<source category>": "<taxonomy category>"}}"#,
        json_list(keys.iter()),
        json_list(vocabulary.iter()),
    )
}

pub fn manufacturer_prompt(keys: &BTreeSet<String>) -> String {
    format!(
        r#"Normalize heavy equipment manufacturer names.

Return ONLY JSON:
{{"<input>": "<canonical>"}}

Examples:
{{"cat": "Caterpillar", "j deere": "John Deere"}}

Rules:
- One entry per input, keyed by the input exactly as given
- Expand abbreviations
- Remove Inc, Corp, Ltd
- Use construction equipment context
- Use double quotes (") only, never single quotes

Input:
{}"#,
        json_list(keys.iter()),
    )
}

fn json_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let items: Vec<&String> = items.collect();
    serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
}
