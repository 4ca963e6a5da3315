//! Defensive extraction of JSON from raw model text.
//!
//! Models prepend commentary, append sign-offs, wrap output in markdown
//! fences, leave trailing commas, and substitute curly quotes. The full
//! cleanup pass handles all of that; if the result still does not parse,
//! a lighter pass (trim + control-character strip) gets one more try
//! before the text is declared unrecoverable.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;

/// Strip markdown code fences from a response.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// Remove commas that sit (possibly across whitespace) before a closer.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace()).copied();
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && !matches!(*c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect()
}

fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full cleanup pass over raw model output.
pub fn clean(raw: &str) -> String {
    let text = strip_fences(raw);
    let mut cleaned: String = text.replace(['\r', '\n'], " ").trim().to_string();

    // Cut leading prose before the first bracket or brace.
    if let Some(start) = cleaned.find(['[', '{']) {
        if start > 0 {
            debug!(dropped = start, "dropped prose before JSON");
            cleaned = cleaned[start..].to_string();
        }
    }

    // Cut trailing prose after the last closer.
    if let Some(end) = cleaned.rfind([']', '}']) {
        if end + 1 < cleaned.len() {
            debug!(dropped = cleaned.len() - end - 1, "dropped prose after JSON");
            cleaned.truncate(end + 1);
        }
    }

    let cleaned = strip_trailing_commas(&cleaned);
    let cleaned = strip_control_chars(&cleaned);
    let cleaned = normalize_quotes(&cleaned);
    collapse_whitespace(&cleaned)
}

/// Light fallback pass: trim plus control-character strip only.
fn light_clean(raw: &str) -> String {
    strip_control_chars(raw.replace(['\r', '\n'], " ").trim())
}

/// Parse model output into `T`, cleaning as needed. With `expect_array`,
/// an envelope object gets unwrapped to its first array-valued property.
pub fn parse_json<T: DeserializeOwned>(raw: &str, expect_array: bool) -> Result<T, LlmError> {
    let cleaned = clean(raw);
    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(full_err) => {
            warn!(error = %full_err, "full cleanup did not yield valid JSON, retrying with light pass");
            let light = light_clean(raw);
            serde_json::from_str(&light).map_err(|light_err| {
                LlmError::JsonParsing(format!(
                    "{light_err} (full cleanup pass failed with: {full_err})"
                ))
            })?
        }
    };

    let value = if expect_array {
        unwrap_array(value)?
    } else {
        value
    };

    serde_json::from_value(value).map_err(|e| LlmError::Shape(e.to_string()))
}

/// Models frequently wrap the requested array in an explanatory envelope
/// object despite instructions to the contrary.
fn unwrap_array(value: Value) -> Result<Value, LlmError> {
    match value {
        Value::Array(_) => Ok(value),
        Value::Object(map) => {
            if let Some(array) = map.values().find(|v| v.is_array()) {
                debug!("unwrapped array from envelope object");
                return Ok(array.clone());
            }
            Err(LlmError::Shape(
                "expected a JSON array, got an object with no array property".to_string(),
            ))
        }
        other => Err(LlmError::Shape(format!(
            "expected a JSON array, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Suggestion;

    #[test]
    fn cleans_prose_and_trailing_comma() {
        let raw = "Here you go:\n[{\"front\":\"a\",\"back\":\"b\"},]\nHope that helps!";
        let cards: Vec<Suggestion> = parse_json(raw, true).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "a");
        assert_eq!(cards[0].back, "b");
    }

    #[test]
    fn unwraps_envelope_object() {
        let raw = r#"{"cards":[{"front":"a","back":"b"}]}"#;
        let cards: Vec<Suggestion> = parse_json(raw, true).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "a");
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n[{\"front\":\"q\",\"back\":\"a\"}]\n```";
        let cards: Vec<Suggestion> = parse_json(raw, true).unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn normalizes_curly_quotes_and_control_chars() {
        let raw = "[{\u{201C}front\u{201D}: \u{201C}a\u{201D}, \u{201C}back\u{201D}: \u{201C}b\u{201D}}]\u{200B}";
        let cards: Vec<Suggestion> = parse_json(raw, true).unwrap();
        assert_eq!(cards[0].back, "b");
    }

    #[test]
    fn object_without_array_property_is_a_shape_error() {
        let raw = r#"{"note":"no cards here"}"#;
        let err = parse_json::<Vec<Suggestion>>(raw, true).unwrap_err();
        assert!(matches!(err, LlmError::Shape(_)));
    }

    #[test]
    fn unrecoverable_text_is_a_parsing_error() {
        let err = parse_json::<Vec<Suggestion>>("I cannot help with that.", true).unwrap_err();
        assert!(matches!(err, LlmError::JsonParsing(_)));
    }

    #[test]
    fn scalar_json_is_a_shape_error_when_array_expected() {
        let err = parse_json::<Vec<Suggestion>>("42", true).unwrap_err();
        assert!(matches!(err, LlmError::Shape(_)));
    }

    #[test]
    fn plain_object_parses_when_array_not_expected() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            cards: Vec<Suggestion>,
        }
        let raw = "Sure!\n{\"cards\": [{\"front\":\"a\",\"back\":\"b\"}],}\nDone.";
        let wrapper: Wrapper = parse_json(raw, false).unwrap();
        assert_eq!(wrapper.cards.len(), 1);
    }
}
