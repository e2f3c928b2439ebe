//! Provider payload parsing.
//!
//! Providers answer with JSON, but frequently wrap it in Markdown fences or
//! surround it with prose. These functions strip that noise and extract
//! loosely-typed candidates. They are pure: semantic checks happen in
//! [`validation`](super::validation).
//!
//! # Accepted shapes
//!
//! | Function | Shape |
//! |----------|-------|
//! | [`parse_collection_payload`] | `[{...}, ...]` or `{"items": [{...}, ...]}` |
//! | [`parse_evaluation_payload`] | `{"rating": ..., "rationale": "..."}` or a one-element array of it |

use crate::core::error::ParseError;
use serde_json::Value;

/// An item as the collector returned it, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvidenceCandidate {
    /// 1-based position in the payload
    pub index: usize,
    /// Provider-supplied local sequence number, if any
    pub sequence: Option<u32>,
    pub title: String,
    pub body: String,
    pub source: String,
    pub source_class: Option<String>,
    pub stance: Option<String>,
    /// Collection-time self-rating, kept raw
    pub rating: Option<String>,
}

/// A rating as the evaluator returned it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResponse {
    pub raw_rating: String,
    pub rationale: String,
}

/// Remove a byte-order mark and Markdown fences, leaving the fenced body.
pub fn strip_formatting(payload: &str) -> &str {
    let mut text = payload.trim().trim_start_matches('\u{feff}').trim();

    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip the language tag on the opening fence line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        text = match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }
    text
}

/// Find the first JSON value in the payload that `extract` accepts.
///
/// Prose may contain brackets of its own (`Found 2 items [verified]: [...]`),
/// so every `[` or `{` is tried in order and trailing text after a value is
/// ignored. When nothing is accepted, a shape error from a well-formed value
/// is reported in preference to a syntax error.
fn extract_json<T>(
    payload: &str,
    extract: impl Fn(&Value) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    let text = strip_formatting(payload);
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut failure: Option<ParseError> = None;
    for (start, _) in text.match_indices(['[', '{']) {
        let error = match serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
        {
            Some(Ok(value)) => match extract(&value) {
                Ok(found) => return Ok(found),
                Err(e) => e,
            },
            Some(Err(e)) => ParseError::InvalidJson(e.to_string()),
            None => continue,
        };
        let replace = match (&failure, &error) {
            (None, _) => true,
            (Some(ParseError::InvalidJson(_)), ParseError::UnexpectedShape(_)) => true,
            _ => false,
        };
        if replace {
            failure = Some(error);
        }
    }

    match failure {
        Some(error) => Err(error),
        None => {
            let value: Value = serde_json::from_str(text)
                .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
            extract(&value)
        }
    }
}

/// Convert a JSON scalar to a trimmed string (numbers included, empty and null as None).
fn json_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => match n.as_i64() {
            Some(i) if i > 0 => Some(format!("+{}", i)),
            Some(i) => Some(i.to_string()),
            None => Some(n.to_string()),
        },
        _ => None,
    }
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(json_value_to_string)
}

/// Parse a collector response into candidates.
///
/// Missing fields become empty strings / `None` so that validation can
/// report exactly what is wrong with each item.
pub fn parse_collection_payload(payload: &str) -> Result<Vec<EvidenceCandidate>, ParseError> {
    extract_json(payload, collection_items)
}

fn collection_items(json: &Value) -> Result<Vec<EvidenceCandidate>, ParseError> {
    let items = match json {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("items")
            .or_else(|| obj.get("evidence"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ParseError::UnexpectedShape("object without an 'items' array".to_string())
            })?,
        _ => {
            return Err(ParseError::UnexpectedShape(
                "expected an array of items".to_string(),
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item.as_object().ok_or_else(|| {
                ParseError::UnexpectedShape(format!("item #{} is not an object", i + 1))
            })?;
            Ok(EvidenceCandidate {
                index: i + 1,
                sequence: obj
                    .get("seq")
                    .or_else(|| obj.get("sequence"))
                    .and_then(|v| v.as_u64())
                    .and_then(|n| u32::try_from(n).ok()),
                title: first_string(obj, &["title", "headline"]).unwrap_or_default(),
                body: first_string(obj, &["body", "content", "summary"]).unwrap_or_default(),
                source: first_string(obj, &["source", "url", "reference"]).unwrap_or_default(),
                source_class: first_string(obj, &["source_class", "source_type"]),
                stance: first_string(obj, &["polarity", "stance", "sentiment"]),
                rating: first_string(obj, &["rating", "self_rating"]),
            })
        })
        .collect()
}

/// Parse an evaluator response into a raw rating and rationale.
pub fn parse_evaluation_payload(payload: &str) -> Result<EvaluationResponse, ParseError> {
    extract_json(payload, evaluation_response)
}

fn evaluation_response(json: &Value) -> Result<EvaluationResponse, ParseError> {
    let obj = match json {
        Value::Object(obj) => obj,
        Value::Array(items) if items.len() == 1 => items[0].as_object().ok_or_else(|| {
            ParseError::UnexpectedShape("evaluation is not an object".to_string())
        })?,
        _ => {
            return Err(ParseError::UnexpectedShape(
                "expected a single evaluation object".to_string(),
            ));
        }
    };

    let raw_rating = first_string(obj, &["rating", "grade", "score"])
        .ok_or_else(|| ParseError::UnexpectedShape("missing 'rating'".to_string()))?;
    let rationale = first_string(obj, &["rationale", "reasoning", "reason"]).unwrap_or_default();

    Ok(EvaluationResponse {
        raw_rating,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_json() {
        let payload = "Here you go:\n```json\n[{\"title\": \"a\"}]\n```\nThanks!";
        assert_eq!(strip_formatting(payload), "[{\"title\": \"a\"}]");
    }

    #[test]
    fn test_strip_unterminated_fence() {
        let payload = "```\n{\"rating\": 1}";
        assert_eq!(strip_formatting(payload), "{\"rating\": 1}");
    }

    #[test]
    fn test_parse_skips_prose_around_object() {
        let r = parse_evaluation_payload("Sure. {\"rating\": \"B\"} Hope that {helps}.").unwrap();
        assert_eq!(r.raw_rating, "B");
    }

    #[test]
    fn test_parse_skips_bracketed_prose_before_payload() {
        let payload = r#"Found 2 items [verified]: [{"title": "Vote", "body": "b"}, {"title": "Speech", "body": "c"}]"#;
        let items = parse_collection_payload(payload).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title, "Speech");

        let payload = r#"Note [1]: {"rating": 2, "rationale": "fine"} [end]"#;
        assert_eq!(parse_evaluation_payload(payload).unwrap().raw_rating, "+2");
    }

    #[test]
    fn test_parse_collection_array() {
        let payload = r#"```json
[
  {"title": "Vote record", "body": "Voted against X", "source": "parliament.example",
   "source_class": "official", "polarity": "negative", "seq": 3},
  {"title": "Interview", "content": "Said Y", "url": "news.example", "stance": "neutral", "rating": 2}
]
```"#;
        let items = parse_collection_payload(payload).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].index, 1);
        assert_eq!(items[0].sequence, Some(3));
        assert_eq!(items[0].stance.as_deref(), Some("negative"));
        assert_eq!(items[1].body, "Said Y");
        assert_eq!(items[1].source, "news.example");
        assert_eq!(items[1].rating.as_deref(), Some("+2"));
        assert_eq!(items[1].source_class, None);
    }

    #[test]
    fn test_parse_collection_items_object() {
        let payload = r#"{"items": [{"title": "t", "body": "b"}]}"#;
        let items = parse_collection_payload(payload).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].stance, None);
    }

    #[test]
    fn test_parse_collection_errors() {
        assert_eq!(parse_collection_payload("   "), Err(ParseError::Empty));
        assert!(matches!(
            parse_collection_payload("[{\"title\": }]"),
            Err(ParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_collection_payload("{\"foo\": 1}"),
            Err(ParseError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_collection_payload("[1, 2]"),
            Err(ParseError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_parse_evaluation_variants() {
        let r = parse_evaluation_payload(r#"{"rating": "B", "rationale": "solid record"}"#).unwrap();
        assert_eq!(r.raw_rating, "B");
        assert_eq!(r.rationale, "solid record");

        let r = parse_evaluation_payload("```json\n{\"rating\": -3, \"reasoning\": \"r\"}\n```").unwrap();
        assert_eq!(r.raw_rating, "-3");
        assert_eq!(r.rationale, "r");

        let r = parse_evaluation_payload(r#"[{"rating": 0}]"#).unwrap();
        assert_eq!(r.raw_rating, "0");
        assert_eq!(r.rationale, "");
    }

    #[test]
    fn test_parse_evaluation_missing_rating() {
        assert!(matches!(
            parse_evaluation_payload(r#"{"rationale": "no score"}"#),
            Err(ParseError::UnexpectedShape(_))
        ));
    }
}
