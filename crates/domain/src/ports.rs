//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{ItemDetail, LedgerRecord, Post};

/// Error type for page source operations
#[derive(Debug, Error)]
pub enum PageSourceError {
    #[error("Page load failed: {0}")]
    PageLoad(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unexpected page content: {0}")]
    Parse(String),
}

/// Port for reading a source feed
#[async_trait]
pub trait PageSource: Send + Sync {
    /// List item identifiers currently shown at the feed location
    async fn list_items(&self, location: &str) -> Result<Vec<String>, PageSourceError>;

    /// Fetch media, caption and timestamp for one item.
    /// Items without media yield an empty `media_uris`, not an error.
    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail, PageSourceError>;

    /// Release any session held for the current cycle
    async fn release(&self) {}
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Media unreadable: {0}")]
    Media(String),
}

/// Result of a successful publish operation
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// Destination-specific submission ID
    pub id: String,
    /// URL to the published content, if available
    pub url: Option<String>,
}

/// Destination account credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Follow-up comment pointing back at the source item
#[derive(Debug, Clone)]
pub struct BackLinkComment {
    pub source_uri: String,
    pub text: String,
}

/// Port for publishing media to the destination platform
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Establish a destination session
    async fn login(&self, credentials: &Credentials) -> Result<(), PublishError>;

    /// Publish a media file under the given title
    async fn publish(&self, file_path: &Path, title: &str) -> Result<PublishResult, PublishError>;

    /// Comment on a published submission with a link to its source
    async fn comment_back_link(
        &self,
        published: &PublishResult,
        comment: &BackLinkComment,
    ) -> Result<(), PublishError>;

    /// Release any session held for the current cycle
    async fn release(&self) {}

    /// Get the platform name
    fn platform(&self) -> &'static str;
}

/// Error type for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the persistent record of relayed items
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Prepare the backing store
    async fn init(&self) -> Result<(), LedgerError>;

    /// Whether the item has been relayed or deliberately skipped
    async fn is_posted(&self, source_uri: &str) -> Result<bool, LedgerError>;

    /// All items marked posted
    async fn list_posted(&self) -> Result<Vec<String>, LedgerError>;

    /// Items observed but not yet posted
    async fn list_unposted(&self) -> Result<Vec<String>, LedgerError>;

    /// Insert an unposted row for a newly observed item; existing rows are untouched
    async fn record_observed(&self, source_uri: &str, at: OffsetDateTime)
    -> Result<(), LedgerError>;

    /// Mark an item posted, inserting the row if needed
    async fn upsert_posted(&self, source_uri: &str, at: OffsetDateTime) -> Result<(), LedgerError>;

    /// Look up a single row
    async fn get(&self, source_uri: &str) -> Result<Option<LedgerRecord>, LedgerError>;
}

/// Error type for media downloads
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status} for {uri}")]
    Status { status: u16, uri: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port for downloading media to local storage
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download one media URI, returning the local file path
    async fn download(&self, media_uri: &str) -> Result<PathBuf, FetchError>;

    /// Remove a file returned by [`MediaFetcher::download`]
    async fn discard(&self, path: &Path) -> Result<(), FetchError>;
}

/// Error type for notifications
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Rejected with status {0}")]
    Status(u16),
}

/// Port for best-effort outbound notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce a post decision
    async fn notify(&self, post: &Post) -> Result<(), NotifyError>;

    /// Check if this notifier is enabled
    fn is_enabled(&self) -> bool;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
