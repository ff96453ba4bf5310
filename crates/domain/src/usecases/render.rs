//! Back-link comment rendering

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ports::BackLinkComment;

/// Placeholder replaced by the source URI
pub const LINK_PLACEHOLDER: &str = "{link}";

/// Phrasings used when none are configured
pub const DEFAULT_PHRASES: &[&str] = &[
    "Original post: {link}",
    "Source: {link}",
    "Link to the original: {link}",
    "Here's where it was first posted: {link}",
    "See the original here: {link}",
];

/// Renders back-link comments, rotating through its phrasings in order
#[derive(Debug)]
pub struct BackLinkRenderer {
    phrases: Vec<String>,
    next: AtomicUsize,
}

impl BackLinkRenderer {
    /// Create a renderer; an empty list falls back to [`DEFAULT_PHRASES`]
    pub fn new(phrases: Vec<String>) -> Self {
        let phrases: Vec<String> = phrases
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let phrases = if phrases.is_empty() {
            DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect()
        } else {
            phrases
        };

        Self {
            phrases,
            next: AtomicUsize::new(0),
        }
    }

    /// Render the next comment for a source item
    pub fn render(&self, source_uri: &str) -> BackLinkComment {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.phrases.len();
        let phrase = &self.phrases[index];

        let text = if phrase.contains(LINK_PLACEHOLDER) {
            phrase.replace(LINK_PLACEHOLDER, source_uri)
        } else {
            format!("{} {}", phrase, source_uri)
        };

        BackLinkComment {
            source_uri: source_uri.to_string(),
            text,
        }
    }
}

impl Default for BackLinkRenderer {
    fn default() -> Self {
        Self::new(vec![])
    }
}
