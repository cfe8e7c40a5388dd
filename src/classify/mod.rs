//! Comment classification and summarization.
//!
//! The classifier and summarizer are external capabilities reached through
//! the [`Classifier`] and [`Summarizer`] traits; [`InsightsClient`] is the
//! HTTP implementation. [`ClassificationPipeline`] drives them over a comment
//! set with incremental cache checkpoints.

mod client;
pub mod pipeline;

pub use client::InsightsClient;
pub use pipeline::{ClassificationPipeline, PipelineStage};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Category, ClassifiedComment, Summary, UnifiedComment};

/// One comment as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifyInput {
    pub id: String,
    pub text: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&UnifiedComment> for ClassifyInput {
    fn from(comment: &UnifiedComment) -> Self {
        Self {
            id: comment.id.clone(),
            text: comment.text.clone(),
            author: comment.author.clone(),
            timestamp: comment.timestamp,
        }
    }
}

/// Classifier verdict for one comment id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Category,
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default)]
    pub toxicity: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl Classification {
    /// Attach this verdict to its comment, clamping scores into range.
    #[must_use]
    pub fn apply(self, comment: UnifiedComment) -> ClassifiedComment {
        ClassifiedComment {
            comment,
            category: self.category,
            sentiment: clamp_score(self.sentiment, -1.0, 1.0),
            toxicity: clamp_score(self.toxicity, 0.0, 1.0),
            reasoning: self.reasoning.filter(|r| !r.trim().is_empty()),
        }
    }
}

fn lenient_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.map_or_else(Category::default, |l| Category::from_label(&l)))
}

/// Non-finite scores become 0.
fn clamp_score(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// One classified comment as sent to the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryInput {
    pub text: String,
    pub category: Category,
    pub sentiment: f64,
    pub toxicity: f64,
    pub reasoning: Option<String>,
}

impl From<&ClassifiedComment> for SummaryInput {
    fn from(c: &ClassifiedComment) -> Self {
        Self {
            text: c.comment.text.clone(),
            category: c.category,
            sentiment: c.sentiment,
            toxicity: c.toxicity,
            reasoning: c.reasoning.clone(),
        }
    }
}

/// Clamp the numeric fields of a summary returned by the summarizer.
#[must_use]
pub fn sanitize_summary(mut summary: Summary) -> Summary {
    summary.overall_sentiment = clamp_score(summary.overall_sentiment, -1.0, 1.0);
    summary.average_toxicity = clamp_score(summary.average_toxicity, 0.0, 1.0);
    summary
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a batch. May return results for only a subset of the ids.
    async fn classify(&self, items: &[ClassifyInput]) -> Result<Vec<Classification>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize a classified set. Must accept an empty slice.
    async fn summarize(&self, items: &[SummaryInput]) -> Result<Summary>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Platform;

    fn comment() -> UnifiedComment {
        UnifiedComment {
            id: "c1".to_string(),
            text: "text".to_string(),
            author: "a".to_string(),
            timestamp: Utc::now(),
            platform: Platform::Instagram,
            content_id: "1".to_string(),
            content_title: "t".to_string(),
            content_url: None,
        }
    }

    #[test]
    fn test_apply_clamps_scores() {
        let verdict = Classification {
            id: "c1".to_string(),
            category: Category::Negative,
            sentiment: -3.0,
            toxicity: 1.7,
            reasoning: Some(String::new()),
        };
        let classified = verdict.apply(comment());
        assert_eq!(classified.sentiment, -1.0);
        assert_eq!(classified.toxicity, 1.0);
        assert_eq!(classified.reasoning, None);
    }

    #[test]
    fn test_non_finite_scores_become_zero() {
        assert_eq!(clamp_score(f64::NAN, -1.0, 1.0), 0.0);
        assert_eq!(clamp_score(f64::INFINITY, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_classification_decodes_leniently() {
        let verdict: Classification = serde_json::from_str(
            r#"{"id":"c1","category":"Sarcasm","sentiment":0.2}"#,
        )
        .unwrap();
        assert_eq!(verdict.category, Category::Neutral);
        assert_eq!(verdict.toxicity, 0.0);

        let verdict: Classification =
            serde_json::from_str(r#"{"id":"c2","category":"HATEFUL","toxicity":0.9}"#).unwrap();
        assert_eq!(verdict.category, Category::Hateful);
    }
}
