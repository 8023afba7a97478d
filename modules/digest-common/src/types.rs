use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Selection ---

/// Opaque, stable identifier for a unit of interest (a company name, or a
/// pipeline-stage id). Uniqueness is required within one selection set.
pub type EntityKey = String;

// --- News wire types ---

/// One news article as returned by the news backend (camelCase wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsRequest {
    pub companies: Vec<EntityKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest {
    pub company: EntityKey,
    pub articles: Vec<NewsArticle>,
}

/// Model-backed summarize response. `summary` is free text and may itself
/// embed a fenced or inline JSON payload — the normalizer unwraps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

// --- Sentiment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

impl Sentiment {
    /// Parse a model-supplied sentiment word, case-insensitively.
    /// Anything unrecognized maps to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Unknown,
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Normalized model output: what the display layer actually renders.
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub text: String,
    pub sentiment: Sentiment,
}

// --- Stage log wire types (snake_case wire) ---

/// How aggressively the server searches upstream logs. Passed through
/// unchanged by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Auto,
    Always,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageLogRequest {
    pub run_search: SearchMode,
}

/// Raw stage-log response. Exactly one of the branch fields is expected, but
/// the wire does not enforce that — branch selection happens in the viewer,
/// inspecting `error`, then `downstream_console_url`, then `log`/`summary`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageLogResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub downstream_console_url: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
    /// Either a bare string or an object with a nested `summary` field.
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
    #[serde(default)]
    pub document_ids: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_parse_is_case_insensitive() {
        assert_eq!(Sentiment::parse("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::parse("  negative "), Sentiment::Negative);
        assert_eq!(Sentiment::parse("NEUTRAL"), Sentiment::Neutral);
        assert_eq!(Sentiment::parse("bullish"), Sentiment::Unknown);
        assert_eq!(Sentiment::parse(""), Sentiment::Unknown);
    }

    #[test]
    fn news_article_uses_camel_case_wire() {
        let json = r#"{
            "title": "Apple launches new iPhone",
            "description": "New design and improved camera.",
            "url": "https://example.com/apple-iphone",
            "publishedAt": "2024-07-04T10:00:00Z",
            "sourceName": "TechCrunch"
        }"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.source_name, "TechCrunch");
        assert_eq!(article.published_at.to_rfc3339(), "2024-07-04T10:00:00+00:00");
    }

    #[test]
    fn summarize_response_tolerates_missing_optional_fields() {
        let resp: SummarizeResponse = serde_json::from_str(r#"{"summary": "ok"}"#).unwrap();
        assert_eq!(resp.summary, "ok");
        assert!(resp.key_points.is_empty());
        assert!(resp.sentiment.is_none());
    }

    #[test]
    fn stage_log_response_branches_deserialize() {
        let err: StageLogResponse = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("boom"));

        let redirect: StageLogResponse =
            serde_json::from_str(r#"{"downstream_console_url": "https://ci/job/42"}"#).unwrap();
        assert_eq!(redirect.downstream_console_url.as_deref(), Some("https://ci/job/42"));

        let content: StageLogResponse = serde_json::from_str(
            r#"{"log": "line 1", "summary": {"summary": "failed compile"}, "document_ids": ["T-1"]}"#,
        )
        .unwrap();
        assert_eq!(content.log.as_deref(), Some("line 1"));
        assert!(content.summary.is_some());
        assert_eq!(content.document_ids.unwrap(), vec!["T-1"]);
    }

    #[test]
    fn search_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SearchMode::Auto).unwrap(), "\"auto\"");
        assert_eq!(serde_json::to_string(&SearchMode::Always).unwrap(), "\"always\"");
    }
}
