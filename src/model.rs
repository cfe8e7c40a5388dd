//! Platform-neutral comment types shared by the collectors, the
//! classification pipeline and the cache.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// An external platform comments are collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Photo/video feed platform (Graph API, business accounts).
    Instagram,
    /// Video platform (channel search + comment threads).
    Youtube,
}

impl Platform {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
        }
    }

    /// Human readable name used in user-facing messages.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::Youtube => "YouTube",
        }
    }

    /// Title used when a media item cannot be matched to stored content.
    #[must_use]
    pub fn placeholder_title(&self) -> &'static str {
        match self {
            Self::Instagram => "Instagram post",
            Self::Youtube => "YouTube video",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseLabelError> {
        match value.to_lowercase().as_str() {
            "instagram" => Ok(Self::Instagram),
            "youtube" => Ok(Self::Youtube),
            _ => Err(ParseLabelError {
                kind: "platform",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which platforms a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFilter {
    All,
    Instagram,
    Youtube,
}

impl PlatformFilter {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseLabelError> {
        match value.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            other => Platform::parse(other).map(Self::from),
        }
    }

    #[must_use]
    pub fn includes(&self, platform: Platform) -> bool {
        match self {
            Self::All => true,
            Self::Instagram => platform == Platform::Instagram,
            Self::Youtube => platform == Platform::Youtube,
        }
    }
}

impl From<Platform> for PlatformFilter {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Instagram => Self::Instagram,
            Platform::Youtube => Self::Youtube,
        }
    }
}

impl fmt::Display for PlatformFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment from either platform, attached to the content it was left on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedComment {
    pub id: String,
    pub text: String,
    pub author: String,
    #[serde(rename = "timestampUTC")]
    pub timestamp: DateTime<Utc>,
    pub platform: Platform,
    /// Internal content id, or `"platform:externalId"` when unmatched.
    pub content_id: String,
    pub content_title: String,
    pub content_url: Option<String>,
}

/// Classifier verdict for a comment.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Positive,
    #[default]
    Neutral,
    Negative,
    Hateful,
    Violent,
    Spam,
}

impl Category {
    /// Lenient parse: anything unrecognised is `Neutral`.
    #[must_use]
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "hateful" | "hate" => Self::Hateful,
            "violent" | "violence" => Self::Violent,
            "spam" => Self::Spam,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Hateful => "hateful",
            Self::Violent => "violent",
            Self::Spam => "spam",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedComment {
    #[serde(flatten)]
    pub comment: UnifiedComment,
    pub category: Category,
    /// In `[-1, 1]`.
    pub sentiment: f64,
    /// In `[0, 1]`.
    pub toxicity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ClassifiedComment {
    /// Wrap a comment with the neutral defaults used when classification fails.
    #[must_use]
    pub fn unclassified(comment: UnifiedComment) -> Self {
        Self {
            comment,
            category: Category::Neutral,
            sentiment: 0.0,
            toxicity: 0.0,
            reasoning: None,
        }
    }
}

/// Aggregate view of a classified comment set, produced by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub overall_sentiment: f64,
    #[serde(default)]
    pub average_toxicity: f64,
    #[serde(default)]
    pub category_counts: BTreeMap<Category, usize>,
    #[serde(default)]
    pub key_themes: Vec<String>,
}

impl Summary {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            overview: "No comments in this period".to_string(),
            overall_sentiment: 0.0,
            average_toxicity: 0.0,
            category_counts: BTreeMap::new(),
            key_themes: Vec::new(),
        }
    }

    /// Summary computed locally from the classified set, used when the
    /// summarizer is unavailable.
    #[must_use]
    pub fn from_counts(comments: &[ClassifiedComment]) -> Self {
        if comments.is_empty() {
            return Self::empty();
        }

        let mut category_counts = BTreeMap::new();
        for c in comments {
            *category_counts.entry(c.category).or_insert(0) += 1;
        }

        let n = comments.len() as f64;
        let overall_sentiment = comments.iter().map(|c| c.sentiment).sum::<f64>() / n;
        let average_toxicity = comments.iter().map(|c| c.toxicity).sum::<f64>() / n;

        Self {
            overview: format!("{} comments analyzed", comments.len()),
            overall_sentiment,
            average_toxicity,
            category_counts,
            key_themes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(id: &str) -> UnifiedComment {
        UnifiedComment {
            id: id.to_string(),
            text: "nice".to_string(),
            author: "someone".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            platform: Platform::Youtube,
            content_id: "youtube:abc".to_string(),
            content_title: "YouTube video".to_string(),
            content_url: None,
        }
    }

    #[test]
    fn test_platform_filter_parse() {
        assert_eq!(PlatformFilter::parse("all").unwrap(), PlatformFilter::All);
        assert_eq!(
            PlatformFilter::parse("YouTube").unwrap(),
            PlatformFilter::Youtube
        );
        assert_eq!(
            PlatformFilter::parse("instagram").unwrap(),
            PlatformFilter::Instagram
        );
        assert!(PlatformFilter::parse("tiktok").is_err());
    }

    #[test]
    fn test_filter_includes() {
        assert!(PlatformFilter::All.includes(Platform::Instagram));
        assert!(PlatformFilter::All.includes(Platform::Youtube));
        assert!(!PlatformFilter::Youtube.includes(Platform::Instagram));
    }

    #[test]
    fn test_category_from_label_is_lenient() {
        assert_eq!(Category::from_label("Hateful"), Category::Hateful);
        assert_eq!(Category::from_label(" spam "), Category::Spam);
        assert_eq!(Category::from_label("sarcastic"), Category::Neutral);
    }

    #[test]
    fn test_classified_comment_serializes_flat() {
        let classified = ClassifiedComment::unclassified(comment("c1"));
        let json = serde_json::to_value(&classified).unwrap();
        assert_eq!(json["id"], "c1");
        assert_eq!(json["contentId"], "youtube:abc");
        assert_eq!(json["category"], "neutral");
        assert_eq!(json["sentiment"], 0.0);
        assert!(json.get("reasoning").is_none());
        assert!(json.get("timestampUTC").is_some());
    }

    #[test]
    fn test_summary_from_counts() {
        let mut a = ClassifiedComment::unclassified(comment("a"));
        a.category = Category::Positive;
        a.sentiment = 0.8;
        let mut b = ClassifiedComment::unclassified(comment("b"));
        b.category = Category::Negative;
        b.sentiment = -0.4;
        b.toxicity = 0.5;

        let summary = Summary::from_counts(&[a, b]);
        assert!((summary.overall_sentiment - 0.2).abs() < 1e-9);
        assert!((summary.average_toxicity - 0.25).abs() < 1e-9);
        assert_eq!(summary.category_counts[&Category::Positive], 1);
        assert_eq!(summary.category_counts[&Category::Negative], 1);
    }

    #[test]
    fn test_summary_from_counts_empty() {
        assert_eq!(Summary::from_counts(&[]), Summary::empty());
    }
}
