//! Tolerant parsing of text-generation output.
//!
//! The text-generation capability returns free-form text; callers must never
//! let a malformed completion fail the pipeline. These helpers strip common
//! markdown fencing and parse best-effort, returning `None` on any mismatch.

use serde::de::DeserializeOwned;

/// Strip markdown code fences (```json ... ```) and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse a JSON value of any deserializable type from a completion.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(strip_code_fences(text)).ok()
}

/// Parse a JSON array of strings from a completion.
pub fn parse_string_array(text: &str) -> Option<Vec<String>> {
    parse_json(text)
}

/// Parse a 1-based choice number from a completion, returning a 0-based index
/// when it falls inside `len`. Tolerates surrounding text ("Answer: 3").
pub fn parse_choice(text: &str, len: usize) -> Option<usize> {
    let digits: String = strip_code_fences(text)
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let n: usize = digits.parse().ok()?;
    let idx = n.checked_sub(1)?;
    if idx < len {
        Some(idx)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fences("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn parses_string_array_or_none() {
        assert_eq!(
            parse_string_array("```json\n[\"Shrimp Scampi\"]\n```"),
            Some(vec!["Shrimp Scampi".to_string()])
        );
        assert_eq!(parse_string_array("sure, here you go:"), None);
    }

    #[test]
    fn parses_choice_within_bounds() {
        assert_eq!(parse_choice("3", 8), Some(2));
        assert_eq!(parse_choice("Answer: 3.", 8), Some(2));
        assert_eq!(parse_choice("9", 8), None);
        assert_eq!(parse_choice("0", 8), None);
        assert_eq!(parse_choice("none of these", 8), None);
    }
}
