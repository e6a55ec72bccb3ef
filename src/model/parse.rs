//! Strict parsing of model output into typed values.
//!
//! Models are asked for JSON but often wrap it in prose or a fenced code
//! block. Parsing tries, in order: the whole text, the first fenced block, the
//! outermost `{...}` span and the outermost `[...]` span. Anything else is
//! returned as [`Parsed::Unparsed`] with the raw text intact.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex"));

/// Either a validated structured value or the raw text that failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parsed<T> {
    Structured { value: T },
    Unparsed { raw: String, reason: String },
}

impl<T> Parsed<T> {
    pub fn is_structured(&self) -> bool {
        matches!(self, Parsed::Structured { .. })
    }

    /// The structured value, if parsing succeeded.
    pub fn structured(self) -> Option<T> {
        match self {
            Parsed::Structured { value } => Some(value),
            Parsed::Unparsed { .. } => None,
        }
    }
}

/// Parse model output as `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Parsed<T> {
    let trimmed = raw.trim();
    let mut first_error: Option<String> = None;

    for candidate in candidates(trimmed) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Parsed::Structured { value },
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    Parsed::Unparsed {
        raw: raw.to_string(),
        reason: format!(
            "invalid JSON: {}",
            first_error.unwrap_or_else(|| "empty response".to_string())
        ),
    }
}

fn candidates(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    if text.is_empty() {
        return found;
    }
    found.push(text);

    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Some(inner) = caps.get(1) {
            found.push(inner.as_str().trim());
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                found.push(&text[start..=end]);
            }
        }
    }

    found.dedup();
    found
}
