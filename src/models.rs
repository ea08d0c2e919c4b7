use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author metadata nested inside a review record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewAuthor {
    #[serde(default)]
    pub playtime_forever: u64,
    /// Unmodeled author fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One review as returned by the storefront API.
///
/// Only the fields the pipeline reads are typed; everything else the source
/// sends is kept in `extra` so records round-trip losslessly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(default)]
    pub recommendationid: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub voted_up: bool,
    #[serde(default)]
    pub votes_up: u64,
    #[serde(default)]
    pub votes_funny: u64,
    #[serde(default)]
    pub author: ReviewAuthor,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response envelope for one page of the appreviews endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsPage {
    #[serde(default)]
    pub success: i64,
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub query_summary: Option<Value>,
}

impl ReviewsPage {
    /// Whether the source's own envelope reports success
    pub fn is_success(&self) -> bool {
        self.success == 1
    }
}

/// Structured insight extracted from a single review by the worker model.
///
/// `task` uses the literal string `"None"` when the review names no
/// actionable work; `confidence` is only meaningful for a real task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub original_review: String,
    pub summary: String,
    pub likes: String,
    pub dislikes: String,
    pub task: String,
    pub confidence: f64,
}

impl ExtractionResult {
    /// Whether the worker identified an actionable developer task
    pub fn has_task(&self) -> bool {
        !self.task.is_empty() && self.task != "None"
    }
}

/// Typed failure line written in place of an `ExtractionResult` when a unit
/// times out, its output cannot be repaired, or dispatch itself fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_record_keeps_unknown_fields() {
        let json = r#"{
            "recommendationid": "123",
            "review": "Great game",
            "voted_up": true,
            "votes_up": 7,
            "votes_funny": 1,
            "language": "english",
            "author": {"steamid": "765", "playtime_forever": 4200}
        }"#;

        let record: ReviewRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.recommendationid, "123");
        assert_eq!(record.author.playtime_forever, 4200);
        assert_eq!(record.extra["language"], "english");
        assert_eq!(record.author.extra["steamid"], "765");

        // Unknown fields survive a round-trip
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["language"], "english");
        assert_eq!(back["author"]["steamid"], "765");
    }

    #[test]
    fn test_envelope_defaults() {
        let page: ReviewsPage = serde_json::from_str(r#"{"success": 1}"#).unwrap();
        assert!(page.is_success());
        assert!(page.reviews.is_empty());
        assert!(page.cursor.is_empty());
        assert!(page.query_summary.is_none());
    }

    #[test]
    fn test_has_task() {
        let mut result = ExtractionResult {
            original_review: "laggy servers".to_string(),
            summary: "complains about lag".to_string(),
            likes: "".to_string(),
            dislikes: "lag".to_string(),
            task: "optimize server synchronization".to_string(),
            confidence: 0.8,
        };
        assert!(result.has_task());

        result.task = "None".to_string();
        assert!(!result.has_task());
        result.task = String::new();
        assert!(!result.has_task());
    }
}
