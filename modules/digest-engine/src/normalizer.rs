//! Normalizes free-text model output into a displayable digest.
//!
//! Summarize responses come back from a generative model and are untrusted:
//! strict JSON, JSON inside a fenced code block, JSON buried in prose, or
//! plain prose with no structure at all. Normalization never fails — when no
//! structure can be recovered it degrades to the raw text with an `Unknown`
//! sentiment, so malformed model output reaches the display layer as text,
//! never as an error.

use regex::Regex;
use serde_json::Value;

use digest_common::{Digest, Sentiment};

/// Outcome of the JSON-recovery scan, before fallbacks are applied.
#[derive(Debug, Clone, PartialEq)]
enum Extracted {
    Parsed {
        summary: Option<String>,
        sentiment: Option<String>,
    },
    Unparsed,
}

/// Normalize a raw model response into `{text, sentiment}`.
///
/// Recovery order, first hit wins:
/// 1. the whole text wrapped in a ``` fence — parse the interior,
/// 2. the whole trimmed text is `{..}` — parse it directly,
/// 3. any minimal brace-balanced substring that parses to an object carrying
///    a string `summary` or `sentiment` field.
///
/// A non-empty input always yields a non-empty `text`.
pub fn normalize(raw: &str) -> Digest {
    match extract(raw) {
        Extracted::Parsed { summary, sentiment } => {
            let text = match summary {
                Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => raw.to_string(),
            };
            let sentiment = match sentiment {
                Some(s) => Sentiment::parse(&s),
                // A payload parsed but the model omitted the field.
                None => Sentiment::Neutral,
            };
            Digest { text, sentiment }
        }
        Extracted::Unparsed => Digest {
            text: raw.to_string(),
            sentiment: Sentiment::Unknown,
        },
    }
}

/// Unwrap the log endpoint's `summary` field, which arrives either as a bare
/// string or as an object with a nested string `summary`.
pub fn summary_field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => match map.get("summary") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn extract(raw: &str) -> Extracted {
    for candidate in candidates(raw) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&candidate) {
            let summary = map.get("summary").and_then(Value::as_str);
            let sentiment = map.get("sentiment").and_then(Value::as_str);
            if summary.is_some() || sentiment.is_some() {
                return Extracted::Parsed {
                    summary: summary.map(str::to_string),
                    sentiment: sentiment.map(str::to_string),
                };
            }
        }
    }
    Extracted::Unparsed
}

/// JSON candidates in priority order: fenced interior, whole text, then each
/// brace-balanced substring.
fn candidates(raw: &str) -> Vec<String> {
    let mut out = Vec::new();

    let fence =
        Regex::new(r"(?is)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("valid fence regex");
    if let Some(caps) = fence.captures(raw) {
        out.push(caps[1].to_string());
    }

    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        out.push(trimmed.to_string());
    }

    out.extend(balanced_objects(raw));
    out
}

/// All minimal brace-balanced `{..}` substrings, outermost first by start
/// position. Nested objects appear as their own later candidates.
fn balanced_objects(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut stack = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => stack.push(i),
            b'}' => {
                if let Some(start) = stack.pop() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans.sort();
    spans
        .into_iter()
        .map(|(start, end)| text[start..end].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_unwrapped() {
        let digest = normalize("```json\n{\"summary\":\"A\",\"sentiment\":\"Positive\"}\n```");
        assert_eq!(digest.text, "A");
        assert_eq!(digest.sentiment, Sentiment::Positive);
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let digest = normalize("```\n{\"summary\":\"Quarterly dip\",\"sentiment\":\"negative\"}\n```");
        assert_eq!(digest.text, "Quarterly dip");
        assert_eq!(digest.sentiment, Sentiment::Negative);
    }

    #[test]
    fn strict_json_parses_directly() {
        let digest = normalize(r#"{"summary": "Record earnings.", "sentiment": "Positive"}"#);
        assert_eq!(digest.text, "Record earnings.");
        assert_eq!(digest.sentiment, Sentiment::Positive);
    }

    #[test]
    fn json_embedded_in_prose_is_found() {
        let raw = "Here is the digest you asked for:\n\
                   {\"summary\": \"Layoffs announced.\", \"sentiment\": \"Negative\"}\n\
                   Let me know if you need anything else.";
        let digest = normalize(raw);
        assert_eq!(digest.text, "Layoffs announced.");
        assert_eq!(digest.sentiment, Sentiment::Negative);
    }

    #[test]
    fn plain_prose_falls_back_to_raw_text() {
        let digest = normalize("Just a plain sentence.");
        assert_eq!(digest.text, "Just a plain sentence.");
        assert_eq!(digest.sentiment, Sentiment::Unknown);
    }

    #[test]
    fn non_empty_input_always_yields_non_empty_text() {
        for raw in ["x", "{}", "{\"other\": 1}", "``` ```", "{\"summary\": \"\"}"] {
            assert!(!normalize(raw).text.is_empty(), "empty text for {raw:?}");
        }
    }

    #[test]
    fn idempotent_on_plain_text() {
        let first = normalize("Markets were flat this week.");
        let second = normalize(&first.text);
        assert_eq!(first, second);
    }

    #[test]
    fn parsed_payload_without_sentiment_defaults_to_neutral() {
        let digest = normalize(r#"{"summary": "Steady quarter."}"#);
        assert_eq!(digest.text, "Steady quarter.");
        assert_eq!(digest.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn empty_parsed_summary_falls_back_to_raw_text() {
        let raw = r#"{"summary": "  ", "sentiment": "Neutral"}"#;
        let digest = normalize(raw);
        assert_eq!(digest.text, raw);
        assert_eq!(digest.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn object_without_summary_or_sentiment_is_rejected() {
        // The embedded object parses but carries neither field, so the scan
        // keeps looking and ultimately falls back to raw text.
        let raw = "Config was {\"retries\": 3} so the run continued.";
        let digest = normalize(raw);
        assert_eq!(digest.text, raw);
        assert_eq!(digest.sentiment, Sentiment::Unknown);
    }

    #[test]
    fn first_qualifying_embedded_object_wins() {
        let raw = "{\"noise\": true} then {\"summary\": \"Real one.\", \"sentiment\": \"Neutral\"}";
        let digest = normalize(raw);
        assert_eq!(digest.text, "Real one.");
        assert_eq!(digest.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn unrecognized_sentiment_word_maps_to_unknown() {
        let digest = normalize(r#"{"summary": "Mixed picture.", "sentiment": "volatile"}"#);
        assert_eq!(digest.sentiment, Sentiment::Unknown);
    }

    #[test]
    fn summary_field_text_handles_string_and_object() {
        assert_eq!(
            summary_field_text(&serde_json::json!("compile failed")),
            Some("compile failed".to_string())
        );
        assert_eq!(
            summary_field_text(&serde_json::json!({"summary": "oom killed"})),
            Some("oom killed".to_string())
        );
        assert_eq!(summary_field_text(&serde_json::json!({"summary": 3})), None);
        assert_eq!(summary_field_text(&serde_json::json!(null)), None);
        assert_eq!(summary_field_text(&serde_json::json!("   ")), None);
    }
}
