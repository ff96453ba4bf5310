//! Domain models and value objects

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use time::OffsetDateTime;

use crate::normalize::{NormalizeOptions, normalize};

/// Detail of a single source item as extracted by a page source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    /// Media locations in display order; empty when the item has no usable media
    #[serde(default)]
    pub media_uris: Vec<String>,
    /// Raw caption text
    #[serde(default)]
    pub caption: String,
    /// When the item was authored
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Whether the media set is video
    #[serde(default)]
    pub is_video: bool,
}

/// Why a post was judged not postable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Stale,
    NoMedia,
    NoTitle,
    OutsideActiveHours,
    RandomlySkipped,
}

impl RejectReason {
    pub const ALL: [RejectReason; 5] = [
        RejectReason::Stale,
        RejectReason::NoMedia,
        RejectReason::NoTitle,
        RejectReason::OutsideActiveHours,
        RejectReason::RandomlySkipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Stale => "stale",
            RejectReason::NoMedia => "no media",
            RejectReason::NoTitle => "no title",
            RejectReason::OutsideActiveHours => "outside active hours",
            RejectReason::RandomlySkipped => "randomly skipped",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eligibility decision for a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Postable,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_postable(&self) -> bool {
        matches!(self, Verdict::Postable)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Postable => None,
            Verdict::Rejected(reason) => Some(*reason),
        }
    }
}

/// How raw captions become display titles
#[derive(Debug, Clone)]
pub struct TitleOptions {
    /// Normalizer settings for the caption
    pub normalize: NormalizeOptions,
    /// Generic titles used when the caption normalizes to nothing
    pub fallback_titles: Vec<String>,
}

impl Default for TitleOptions {
    fn default() -> Self {
        Self {
            normalize: NormalizeOptions::caption(),
            fallback_titles: vec![],
        }
    }
}

/// A source item prepared for relaying.
///
/// Built once per scan cycle for every newly observed source URI and dropped when
/// the cycle ends. Only `verdict` (once) and `file_path` change after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Stable identifier of the source item, used as the ledger key
    pub source_uri: String,
    /// Media locations in display order
    pub media_uris: Vec<String>,
    /// Whether the media set is video rather than still images
    pub is_video: bool,
    /// Normalized display title, possibly empty
    pub title: String,
    /// When the source item was authored
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    #[serde(skip)]
    verdict: Option<Verdict>,
    /// Local path of the downloaded primary media
    pub file_path: Option<PathBuf>,
}

impl Post {
    /// Build a post from a fetched item detail, normalizing its caption into a title
    pub fn from_detail<R: Rng + ?Sized>(
        source_uri: impl Into<String>,
        detail: ItemDetail,
        options: &TitleOptions,
        rng: &mut R,
    ) -> Self {
        let mut title = normalize(&detail.caption, options.normalize);
        if title.is_empty() {
            if let Some(fallback) = options.fallback_titles.choose(rng) {
                title = fallback.trim().to_string();
            }
        }

        Self {
            source_uri: source_uri.into(),
            media_uris: detail.media_uris,
            is_video: detail.is_video,
            title,
            captured_at: detail.captured_at,
            verdict: None,
            file_path: None,
        }
    }

    pub fn is_multiple(&self) -> bool {
        self.media_uris.len() > 1
    }

    /// First media location, the one that gets downloaded and published
    pub fn primary_media(&self) -> Option<&str> {
        self.media_uris.first().map(String::as_str)
    }

    /// Record the eligibility verdict. Only the first call has an effect.
    pub fn decide(&mut self, verdict: Verdict) -> bool {
        if self.verdict.is_some() {
            tracing::warn!(source_uri = %self.source_uri, "Verdict already decided, ignoring");
            return false;
        }
        self.verdict = Some(verdict);
        true
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Undecided posts are never postable
    pub fn is_postable(&self) -> bool {
        self.verdict.is_some_and(|v| v.is_postable())
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.verdict.and_then(|v| v.reason())
    }
}

/// A ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub source_uri: String,
    pub posted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub first_seen_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub posted_at: Option<OffsetDateTime>,
}

/// Whether a cycle stops after its first successful publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// At most one publish per cycle
    #[default]
    Single,
    /// Publish every eligible post found in the cycle
    Batch,
}

/// Order in which a page source lists items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Processing result for a single source item
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// Post was published and recorded
    Published {
        title: String,
        publish_id: Option<String>,
        url: Option<String>,
    },
    /// Post was ineligible and recorded as seen
    Skipped { reason: RejectReason },
    /// Post was left unrecorded and will be reconsidered next cycle
    Deferred { reason: String },
    /// Publishing failed; the rest of the cycle was abandoned
    Failed { error: String },
}

/// Summary of one scan cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Identifiers returned by the page source
    pub listed: usize,
    /// Identifiers not yet posted according to the ledger
    pub discovered: usize,
    /// Per-item results in publish order
    pub outcomes: Vec<(String, ProcessResult)>,
    /// Whether publishing stopped early because of a failure
    pub halted: bool,
}

impl CycleReport {
    /// Nothing new was found
    pub fn is_idle(&self) -> bool {
        self.discovered == 0
    }

    pub fn published_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| matches!(r, ProcessResult::Published { .. }))
            .count()
    }

    /// Publishes that reached the destination; dry-run outcomes carry no id
    pub fn recorded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| {
                matches!(
                    r,
                    ProcessResult::Published {
                        publish_id: Some(_),
                        ..
                    }
                )
            })
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| matches!(r, ProcessResult::Skipped { .. }))
            .count()
    }

    pub fn deferred_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| matches!(r, ProcessResult::Deferred { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn detail(media: &[&str], caption: &str) -> ItemDetail {
        ItemDetail {
            media_uris: media.iter().map(|m| m.to_string()).collect(),
            caption: caption.to_string(),
            captured_at: OffsetDateTime::UNIX_EPOCH,
            is_video: false,
        }
    }

    #[test]
    fn test_is_multiple_follows_media_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = TitleOptions::default();

        for (media, expected) in [
            (vec![], false),
            (vec!["a.jpg"], false),
            (vec!["a.jpg", "b.jpg"], true),
            (vec!["a.jpg", "b.jpg", "c.jpg"], true),
        ] {
            let post = Post::from_detail("uri", detail(&media, "caption"), &options, &mut rng);
            assert_eq!(post.is_multiple(), expected);
            assert_eq!(post.is_multiple(), post.media_uris.len() > 1);
        }
    }

    #[test]
    fn test_from_detail_normalizes_caption() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = TitleOptions {
            normalize: NormalizeOptions {
                strip_prefix: true,
                cap_length: true,
            },
            fallback_titles: vec![],
        };

        let post = Post::from_detail(
            "https://example.com/p/1",
            detail(&["a.jpg"], "someone on Feed: \u{201C}Hello there @friend\u{201D}"),
            &options,
            &mut rng,
        );

        assert_eq!(post.title, "Hello there");
        assert!(post.file_path.is_none());
        assert!(post.verdict().is_none());
    }

    #[test]
    fn test_fallback_title_used_for_empty_caption() {
        let mut rng = StdRng::seed_from_u64(7);
        let options = TitleOptions {
            normalize: NormalizeOptions::default(),
            fallback_titles: vec!["New post!".to_string()],
        };

        let post = Post::from_detail("uri", detail(&["a.jpg"], "@only @mentions"), &options, &mut rng);
        assert_eq!(post.title, "New post!");
    }

    #[test]
    fn test_verdict_is_decided_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut post = Post::from_detail(
            "uri",
            detail(&["a.jpg"], "caption"),
            &TitleOptions::default(),
            &mut rng,
        );

        assert!(!post.is_postable());
        assert!(post.decide(Verdict::Rejected(RejectReason::Stale)));
        assert!(!post.decide(Verdict::Postable));
        assert!(!post.is_postable());
        assert_eq!(post.reject_reason(), Some(RejectReason::Stale));
    }

    #[test]
    fn test_reject_reason_strings() {
        let strings: Vec<_> = RejectReason::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            strings,
            vec![
                "stale",
                "no media",
                "no title",
                "outside active hours",
                "randomly skipped"
            ]
        );
    }

    #[test]
    fn test_cycle_report_counts() {
        let report = CycleReport {
            listed: 3,
            discovered: 3,
            outcomes: vec![
                (
                    "a".to_string(),
                    ProcessResult::Skipped {
                        reason: RejectReason::Stale,
                    },
                ),
                (
                    "b".to_string(),
                    ProcessResult::Published {
                        title: "t".to_string(),
                        publish_id: None,
                        url: None,
                    },
                ),
                (
                    "c".to_string(),
                    ProcessResult::Deferred {
                        reason: "single publish per cycle".to_string(),
                    },
                ),
            ],
            halted: false,
        };

        assert!(!report.is_idle());
        assert_eq!(report.published_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.deferred_count(), 1);
        assert_eq!(report.recorded_count(), 0);
    }
}
