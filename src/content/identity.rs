//! Matches media/video ids returned by a platform to stored content records.
//!
//! Each record contributes every non-empty candidate key to one index; an
//! external item is then looked up by its own id and, failing that, by its
//! permalink. Unmatched items get a synthetic `"platform:externalId"` identity
//! so their comments are never dropped.

use std::collections::HashMap;

use super::ContentRecord;
use crate::model::Platform;

type KeyExtractor = fn(&ContentRecord) -> Option<&str>;

/// Candidate keys in priority order. Earlier keys win when two records
/// share a value.
const CANDIDATE_KEYS: &[(&str, KeyExtractor)] = &[
    ("remote_media_id", remote_media_id),
    ("remote_creation_id", remote_creation_id),
    ("platform_post_id", platform_post_id),
    ("permalink_url", permalink_url),
    ("media_url", media_url),
];

fn remote_media_id(r: &ContentRecord) -> Option<&str> {
    r.remote_media_id.as_deref()
}

fn remote_creation_id(r: &ContentRecord) -> Option<&str> {
    r.remote_creation_id.as_deref()
}

fn platform_post_id(r: &ContentRecord) -> Option<&str> {
    r.platform_post_id.as_deref()
}

fn permalink_url(r: &ContentRecord) -> Option<&str> {
    r.permalink_url.as_deref()
}

fn media_url(r: &ContentRecord) -> Option<&str> {
    r.media_url.as_deref()
}

const MAX_SYNTHETIC_TITLE_CHARS: usize = 80;

/// A media item or video as returned by a platform API.
#[derive(Debug, Clone, Copy)]
pub struct ExternalItem<'a> {
    pub id: &'a str,
    pub permalink: Option<&'a str>,
    /// Caption or title, used for synthetic titles.
    pub caption: Option<&'a str>,
}

/// Content identity attached to every comment from one media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentity {
    pub content_id: String,
    pub content_title: String,
    pub content_url: Option<String>,
    /// False for synthetic identities.
    pub matched: bool,
}

impl ContentIdentity {
    #[must_use]
    pub fn from_record(record: &ContentRecord) -> Self {
        Self {
            content_id: record.id.to_string(),
            content_title: record
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| record.platform.placeholder_title().to_string()),
            content_url: record.permalink_url.clone().or_else(|| record.media_url.clone()),
            matched: true,
        }
    }

    #[must_use]
    pub fn synthetic(platform: Platform, item: &ExternalItem<'_>) -> Self {
        let title = item
            .caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(
                || platform.placeholder_title().to_string(),
                |c| truncate_title(c, MAX_SYNTHETIC_TITLE_CHARS),
            );

        Self {
            content_id: format!("{}:{}", platform.as_str(), item.id),
            content_title: title,
            content_url: item.permalink.map(ToString::to_string),
            matched: false,
        }
    }
}

/// Index from candidate key to stored record, built once per request.
#[derive(Debug, Default)]
pub struct ContentIndex {
    records: Vec<ContentRecord>,
    by_key: HashMap<String, usize>,
}

impl ContentIndex {
    #[must_use]
    pub fn build(records: Vec<ContentRecord>) -> Self {
        let mut by_key = HashMap::new();
        for (key_name, extract) in CANDIDATE_KEYS {
            for (idx, record) in records.iter().enumerate() {
                if let Some(key) = extract(record).and_then(normalize_key) {
                    by_key.entry(key).or_insert_with(|| {
                        tracing::trace!(record_id = record.id, key = key_name, "Indexed content key");
                        idx
                    });
                }
            }
        }
        Self { records, by_key }
    }

    #[must_use]
    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the stored record for an external item, trying its id first and
    /// then its permalink.
    #[must_use]
    pub fn lookup(&self, item: &ExternalItem<'_>) -> Option<&ContentRecord> {
        [Some(item.id), item.permalink]
            .into_iter()
            .flatten()
            .filter_map(normalize_key)
            .find_map(|key| self.by_key.get(&key))
            .map(|&idx| &self.records[idx])
    }

    /// Resolve an external item to a content identity. Never fails: items
    /// matching nothing get a synthetic identity.
    #[must_use]
    pub fn resolve(&self, platform: Platform, item: &ExternalItem<'_>) -> ContentIdentity {
        self.lookup(item).map_or_else(
            || ContentIdentity::synthetic(platform, item),
            ContentIdentity::from_record,
        )
    }
}

fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.trim().trim_end_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

fn truncate_title(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or(text).trim();
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_chars - 1).collect();
        format!("{}…", truncated.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64) -> ContentRecord {
        ContentRecord {
            id,
            owner_id: 1,
            platform: Platform::Instagram,
            title: Some(format!("Record {id}")),
            remote_media_id: None,
            remote_creation_id: None,
            permalink_url: None,
            media_url: None,
            platform_post_id: None,
            created_at: Utc::now(),
        }
    }

    fn item<'a>(id: &'a str, permalink: Option<&'a str>) -> ExternalItem<'a> {
        ExternalItem {
            id,
            permalink,
            caption: None,
        }
    }

    #[test]
    fn test_match_by_remote_media_id() {
        let mut r = record(10);
        r.remote_media_id = Some("X".to_string());
        let index = ContentIndex::build(vec![r]);

        let identity = index.resolve(Platform::Instagram, &item("X", None));
        assert_eq!(identity.content_id, "10");
        assert_eq!(identity.content_title, "Record 10");
        assert!(identity.matched);
    }

    #[test]
    fn test_match_by_creation_id() {
        let mut r = record(11);
        r.remote_creation_id = Some("creation-1".to_string());
        let index = ContentIndex::build(vec![r]);

        assert_eq!(
            index
                .resolve(Platform::Instagram, &item("creation-1", None))
                .content_id,
            "11"
        );
    }

    #[test]
    fn test_match_falls_back_to_permalink() {
        let mut r = record(12);
        r.permalink_url = Some("https://www.instagram.com/p/abc/".to_string());
        let index = ContentIndex::build(vec![r]);

        let identity = index.resolve(
            Platform::Instagram,
            &item("999", Some("https://www.instagram.com/p/abc")),
        );
        assert_eq!(identity.content_id, "12");
        assert_eq!(
            identity.content_url.as_deref(),
            Some("https://www.instagram.com/p/abc/")
        );
    }

    #[test]
    fn test_id_takes_priority_over_permalink() {
        let mut by_id = record(1);
        by_id.remote_media_id = Some("M1".to_string());
        let mut by_link = record(2);
        by_link.permalink_url = Some("https://example.com/p/1".to_string());
        let index = ContentIndex::build(vec![by_link, by_id]);

        let identity = index.resolve(
            Platform::Instagram,
            &item("M1", Some("https://example.com/p/1")),
        );
        assert_eq!(identity.content_id, "1");
    }

    #[test]
    fn test_first_record_wins_on_shared_key() {
        let mut newer = record(20);
        newer.media_url = Some("https://cdn.example.com/a.jpg".to_string());
        let mut older = record(19);
        older.media_url = Some("https://cdn.example.com/a.jpg".to_string());
        let index = ContentIndex::build(vec![newer, older]);

        let identity = index.resolve(
            Platform::Instagram,
            &item("https://cdn.example.com/a.jpg", None),
        );
        assert_eq!(identity.content_id, "20");
    }

    #[test]
    fn test_empty_keys_are_not_indexed() {
        let mut r = record(30);
        r.remote_media_id = Some("   ".to_string());
        let index = ContentIndex::build(vec![r]);

        let identity = index.resolve(Platform::Instagram, &item("", None));
        assert!(!identity.matched);
    }

    #[test]
    fn test_unmatched_item_gets_synthetic_identity() {
        let index = ContentIndex::build(vec![record(1)]);
        let external = ExternalItem {
            id: "vid123",
            permalink: Some("https://www.youtube.com/watch?v=vid123"),
            caption: Some("Launch day recap"),
        };

        let identity = index.resolve(Platform::Youtube, &external);
        assert_eq!(identity.content_id, "youtube:vid123");
        assert_eq!(identity.content_title, "Launch day recap");
        assert_eq!(
            identity.content_url.as_deref(),
            Some("https://www.youtube.com/watch?v=vid123")
        );
        assert!(!identity.matched);
    }

    #[test]
    fn test_synthetic_title_placeholder_and_truncation() {
        let no_caption = ContentIdentity::synthetic(Platform::Instagram, &item("1", None));
        assert_eq!(no_caption.content_title, "Instagram post");

        let long = "a".repeat(200);
        let external = ExternalItem {
            id: "2",
            permalink: None,
            caption: Some(&long),
        };
        let identity = ContentIdentity::synthetic(Platform::Instagram, &external);
        assert_eq!(identity.content_title.chars().count(), MAX_SYNTHETIC_TITLE_CHARS);
        assert!(identity.content_title.ends_with('…'));
    }

    #[test]
    fn test_record_without_title_uses_placeholder() {
        let mut r = record(5);
        r.title = None;
        r.platform = Platform::Youtube;
        assert_eq!(ContentIdentity::from_record(&r).content_title, "YouTube video");
    }
}
