//! Outbox publisher for manual-approval mode.
//!
//! Appends one JSON line per submission instead of contacting the destination.
//! Media is copied next to the outbox so it outlives the scratch directory.

use async_trait::async_trait;
use feed_relay_domain::ports::{
    BackLinkComment, Credentials, PublishError, PublishResult, Publisher,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OutboxWriter {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(path: PathBuf) -> Result<Self, OutboxError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding copies of submitted media
    pub fn media_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("media")
    }

    async fn keep_media(&self, id: &str, file_path: &Path) -> Result<PathBuf, OutboxError> {
        let media_dir = self.media_dir();
        fs::create_dir_all(&media_dir).await?;

        let name = match file_path.extension() {
            Some(ext) => format!("{}.{}", id, ext.to_string_lossy()),
            None => id.to_string(),
        };
        let kept = media_dir.join(name);
        fs::copy(file_path, &kept).await?;
        Ok(kept)
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        let line = serde_json::to_string(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OutboxPublisher {
    writer: OutboxWriter,
}

impl OutboxPublisher {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OutboxEntry<'a> {
    Submission {
        id: &'a str,
        title: &'a str,
        file_path: &'a Path,
    },
    Comment {
        submission_id: &'a str,
        source_uri: &'a str,
        text: &'a str,
    },
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn login(&self, _credentials: &Credentials) -> Result<(), PublishError> {
        Ok(())
    }

    async fn publish(&self, file_path: &Path, title: &str) -> Result<PublishResult, PublishError> {
        let id = Uuid::new_v4().to_string();
        let kept = self
            .writer
            .keep_media(&id, file_path)
            .await
            .map_err(|error| PublishError::Media(format!("{}: {}", file_path.display(), error)))?;

        let entry = OutboxEntry::Submission {
            id: &id,
            title,
            file_path: &kept,
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| PublishError::Api(format!("Outbox write failed: {}", error)))?;

        Ok(PublishResult { id, url: None })
    }

    async fn comment_back_link(
        &self,
        published: &PublishResult,
        comment: &BackLinkComment,
    ) -> Result<(), PublishError> {
        let entry = OutboxEntry::Comment {
            submission_id: &published.id,
            source_uri: &comment.source_uri,
            text: &comment.text,
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| PublishError::Api(format!("Outbox write failed: {}", error)))
    }

    fn platform(&self) -> &'static str {
        "outbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    #[tokio::test]
    async fn outbox_publish_fails_for_missing_media() {
        let dir = TempDir::new().expect("temp dir");
        let writer = OutboxWriter::new(dir.path().join("outbox.jsonl"))
            .await
            .expect("writer");
        let publisher = OutboxPublisher::new(writer);

        let result = publisher
            .publish(&dir.path().join("missing.jpg"), "title")
            .await;

        assert!(matches!(result, Err(PublishError::Media(_))));
    }

    #[tokio::test]
    async fn outbox_publisher_writes_jsonl_entries() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("outbox").join("outbox.jsonl");

        let scratch_file = dir.path().join("1_a.jpg");
        std::fs::write(&scratch_file, b"jpeg").expect("write media");

        let writer = OutboxWriter::new(path.clone()).await.expect("writer");
        let media_dir = writer.media_dir();
        let publisher = OutboxPublisher::new(writer);

        let result = publisher
            .publish(&scratch_file, "Great day!!")
            .await
            .expect("publish");
        assert!(!result.id.is_empty());

        // The submission survives the scratch file
        std::fs::remove_file(&scratch_file).expect("remove scratch");
        let kept = media_dir.join(format!("{}.jpg", result.id));
        assert_eq!(std::fs::read(&kept).expect("kept media"), b"jpeg");

        publisher
            .comment_back_link(
                &result,
                &BackLinkComment {
                    source_uri: "https://src/p/1".to_string(),
                    text: "Source: https://src/p/1".to_string(),
                },
            )
            .await
            .expect("comment");

        let contents = tokio::fs::read_to_string(&path).await.expect("read outbox");
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid json"))
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "submission");
        assert_eq!(lines[0]["title"], "Great day!!");
        assert_eq!(lines[0]["file_path"], kept.to_str().unwrap());
        assert_eq!(lines[1]["kind"], "comment");
        assert_eq!(lines[1]["submission_id"], result.id.as_str());
        assert_eq!(lines[1]["source_uri"], "https://src/p/1");
    }
}
