//! Media download into a scratch directory

use async_trait::async_trait;
use feed_relay_domain::{FetchError, MediaFetcher};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Extension used when the URI carries no known media-type hint
pub const DEFAULT_EXTENSION: &str = "jpg";

const KNOWN_EXTENSIONS: &[&str] = &["png", "gif", "webp", "jpeg", "jpg", "mp4", "mov"];

/// Pick a file extension from hints in a media URI's path
pub fn media_extension(media_uri: &str) -> &'static str {
    let path = media_uri
        .split(['?', '#'])
        .next()
        .unwrap_or(media_uri)
        .to_ascii_lowercase();
    let last_segment = path.rsplit('/').next().unwrap_or("");

    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| {
            last_segment
                .rsplit_once('.')
                .is_some_and(|(_, found)| found == **ext)
        })
        .map(|ext| if *ext == "jpeg" { "jpg" } else { *ext })
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Downloads media over HTTP into a scratch directory
pub struct HttpMediaFetcher {
    client: Client,
    scratch_dir: PathBuf,
}

impl HttpMediaFetcher {
    pub fn new(scratch_dir: PathBuf, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            scratch_dir,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// `<unix-millis>_<uuid>.<ext>`
    fn scratch_name(media_uri: &str) -> String {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        format!(
            "{}_{}.{}",
            millis,
            Uuid::new_v4().simple(),
            media_extension(media_uri)
        )
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn download(&self, media_uri: &str) -> Result<PathBuf, FetchError> {
        let response = self
            .client
            .get(media_uri)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                uri: media_uri.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.scratch_dir.join(Self::scratch_name(media_uri));
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(
            uri = %media_uri,
            path = %path.display(),
            bytes = bytes.len(),
            sha256 = %format!("{:x}", Sha256::digest(&bytes)),
            "Downloaded media"
        );

        Ok(path)
    }

    async fn discard(&self, path: &Path) -> Result<(), FetchError> {
        if !path.starts_with(self.scratch_dir()) {
            tracing::warn!(path = %path.display(), "Refusing to remove file outside scratch dir");
            return Ok(());
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed scratch file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
