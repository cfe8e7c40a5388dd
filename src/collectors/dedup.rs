//! Tracking of already-processed remote items and comments within a request.

use std::collections::HashSet;

use tracing::info;

use crate::model::{Platform, UnifiedComment};

/// External ids whose comments have already been fetched in this request.
///
/// The stored-content pass marks every video it resolves; the channel-wide
/// fallback pass skips anything marked, so each remote item is fetched at most
/// once no matter how many paths reach it.
#[derive(Debug, Default)]
pub struct ProcessedIds {
    seen: HashSet<String>,
}

impl ProcessedIds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an id as processed. Returns `false` if it already was.
    pub fn mark(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Drop repeated comments (same platform and id), keeping the first.
#[must_use]
pub fn dedup_comments(comments: Vec<UnifiedComment>) -> Vec<UnifiedComment> {
    let total = comments.len();
    let mut seen: HashSet<(Platform, String)> = HashSet::with_capacity(total);
    let unique: Vec<_> = comments
        .into_iter()
        .filter(|c| seen.insert((c.platform, c.id.clone())))
        .collect();

    let removed = total - unique.len();
    if removed > 0 {
        info!(duplicates_removed = removed, "Removed duplicate comments");
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(platform: Platform, id: &str, text: &str) -> UnifiedComment {
        UnifiedComment {
            id: id.to_string(),
            text: text.to_string(),
            author: "a".to_string(),
            timestamp: Utc::now(),
            platform,
            content_id: "1".to_string(),
            content_title: "t".to_string(),
            content_url: None,
        }
    }

    #[test]
    fn test_mark_reports_first_sighting() {
        let mut ids = ProcessedIds::new();
        assert!(ids.mark("v1"));
        assert!(!ids.mark("v1"));
        assert!(ids.contains("v1"));
        assert!(!ids.contains("v2"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let comments = vec![
            comment(Platform::Youtube, "c1", "first"),
            comment(Platform::Youtube, "c1", "second"),
            comment(Platform::Instagram, "c1", "other platform"),
        ];
        let unique = dedup_comments(comments);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].text, "first");
        assert_eq!(unique[1].platform, Platform::Instagram);
    }
}
