//! Publisher adapters

mod http;

pub use http::HttpPublisher;

use async_trait::async_trait;
use feed_relay_domain::{
    BackLinkComment, Credentials, PublishError, PublishResult, Publisher,
};
use std::path::{Path, PathBuf};

/// Stub publisher for testing
pub struct StubPublisher {
    enabled: bool,
    published: std::sync::Mutex<Vec<(PathBuf, String)>>,
    comments: std::sync::Mutex<Vec<BackLinkComment>>,
}

impl StubPublisher {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            published: std::sync::Mutex::new(vec![]),
            comments: std::sync::Mutex::new(vec![]),
        }
    }

    /// Get all (file, title) pairs that were published
    pub fn get_published(&self) -> Vec<(PathBuf, String)> {
        self.published.lock().unwrap().clone()
    }

    /// Get all back-link comments that were posted
    pub fn get_comments(&self) -> Vec<BackLinkComment> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for StubPublisher {
    async fn login(&self, _credentials: &Credentials) -> Result<(), PublishError> {
        if !self.enabled {
            return Err(PublishError::Auth("Publisher disabled".to_string()));
        }
        Ok(())
    }

    async fn publish(&self, file_path: &Path, title: &str) -> Result<PublishResult, PublishError> {
        if !self.enabled {
            return Err(PublishError::Api("Publisher disabled".to_string()));
        }

        let mut published = self.published.lock().unwrap();
        published.push((file_path.to_path_buf(), title.to_string()));
        let id = format!("stub_{}", published.len());

        Ok(PublishResult {
            url: Some(format!("https://relay.invalid/s/{}", id)),
            id,
        })
    }

    async fn comment_back_link(
        &self,
        _published: &PublishResult,
        comment: &BackLinkComment,
    ) -> Result<(), PublishError> {
        self.comments.lock().unwrap().push(comment.clone());
        Ok(())
    }

    fn platform(&self) -> &'static str {
        "stub"
    }
}
