//! Chunked classification with cache checkpoints, followed by one summary
//! pass.
//!
//! After every chunk the classified-so-far set is written to the cache with
//! `summary = None`, so a crash mid-run still leaves a usable entry. Failures
//! of the classifier or summarizer never fail the run: the affected comments
//! get neutral defaults and the summary is computed locally.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::{Classifier, ClassifyInput, Summarizer, SummaryInput};
use crate::cache::{AnalysisCache, AnalysisCacheEntry, CacheKey};
use crate::model::{ClassifiedComment, Summary, UnifiedComment};

/// Default number of comments per classifier call.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Where a run is, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Unclassified,
    Classifying,
    PartiallyCached,
    AllClassified,
    Summarizing,
    Cached,
}

impl PipelineStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Classifying => "classifying",
            Self::PartiallyCached => "partially_cached",
            Self::AllClassified => "all_classified",
            Self::Summarizing => "summarizing",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ClassificationPipeline {
    classifier: Arc<dyn Classifier>,
    summarizer: Arc<dyn Summarizer>,
    chunk_size: usize,
}

impl ClassificationPipeline {
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            classifier,
            summarizer,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Classify `comments`, checkpointing after each chunk, then summarize
    /// and write the terminal entry. `comments` should already be sorted and
    /// capped.
    ///
    /// # Errors
    ///
    /// Returns an error only if a cache write fails.
    pub async fn run(
        &self,
        cache: &dyn AnalysisCache,
        key: &CacheKey,
        comments: Vec<UnifiedComment>,
    ) -> Result<AnalysisCacheEntry> {
        let total = comments.len();
        let total_chunks = total.div_ceil(self.chunk_size);
        debug!(
            user_id = key.user_id,
            stage = %PipelineStage::Unclassified,
            comments = total,
            chunks = total_chunks,
            "Starting classification"
        );

        let mut classified: Vec<ClassifiedComment> = Vec::with_capacity(total);
        let mut remaining = comments.into_iter().peekable();
        let mut chunk = 0;

        while remaining.peek().is_some() {
            chunk += 1;
            let batch: Vec<UnifiedComment> = remaining.by_ref().take(self.chunk_size).collect();
            debug!(stage = %PipelineStage::Classifying, chunk, total_chunks, size = batch.len(), "Classifying chunk");

            classified.extend(self.classify_chunk(batch, chunk).await);

            let checkpoint = AnalysisCacheEntry::new(classified.clone(), None, key.range, Utc::now());
            cache
                .upsert(key, &checkpoint)
                .await
                .context("Failed to write classification checkpoint")?;
            debug!(stage = %PipelineStage::PartiallyCached, chunk, classified = classified.len(), "Checkpoint written");
        }

        debug!(stage = %PipelineStage::AllClassified, classified = classified.len(), "Classification finished");

        debug!(stage = %PipelineStage::Summarizing, "Summarizing");
        let summary = self.summarize(&classified).await;

        let entry = AnalysisCacheEntry::new(classified, Some(summary), key.range, Utc::now());
        cache
            .upsert(key, &entry)
            .await
            .context("Failed to write analysis result")?;

        info!(
            user_id = key.user_id,
            platform = %key.platform,
            range = %key.range,
            stage = %PipelineStage::Cached,
            comments = entry.comments.len(),
            "Analysis cached"
        );
        Ok(entry)
    }

    /// Classify one chunk. Ids the classifier omits, or every id if the call
    /// fails, get neutral defaults.
    async fn classify_chunk(&self, batch: Vec<UnifiedComment>, chunk: usize) -> Vec<ClassifiedComment> {
        let request_ids = request_ids(&batch);
        let inputs: Vec<ClassifyInput> = batch
            .iter()
            .zip(&request_ids)
            .map(|(comment, id)| ClassifyInput {
                id: id.clone(),
                ..ClassifyInput::from(comment)
            })
            .collect();

        let mut verdicts: HashMap<_, _> = match self.classifier.classify(&inputs).await {
            Ok(results) => results.into_iter().map(|r| (r.id.clone(), r)).collect(),
            Err(e) => {
                warn!(chunk, size = batch.len(), error = %e, "Classifier failed, using defaults for chunk");
                HashMap::new()
            }
        };

        batch
            .into_iter()
            .zip(request_ids)
            .map(|(comment, id)| match verdicts.remove(&id) {
                Some(verdict) => verdict.apply(comment),
                None => ClassifiedComment::unclassified(comment),
            })
            .collect()
    }

    async fn summarize(&self, classified: &[ClassifiedComment]) -> Summary {
        let inputs: Vec<SummaryInput> = classified.iter().map(SummaryInput::from).collect();
        match self.summarizer.summarize(&inputs).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(comments = classified.len(), error = %e, "Summarizer failed, using local summary");
                Summary::from_counts(classified)
            }
        }
    }
}

/// Ids sent to the classifier, unique within one batch. A comment id shared
/// by both platforms is qualified as `"platform:id"`.
fn request_ids(batch: &[UnifiedComment]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for comment in batch {
        *seen.entry(comment.id.as_str()).or_insert(0) += 1;
    }
    batch
        .iter()
        .map(|comment| {
            if seen[comment.id.as_str()] > 1 {
                format!("{}:{}", comment.platform, comment.id)
            } else {
                comment.id.clone()
            }
        })
        .collect()
}
