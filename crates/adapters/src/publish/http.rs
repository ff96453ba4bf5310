//! HTTP form publisher for the destination platform

use async_trait::async_trait;
use feed_relay_domain::{BackLinkComment, Credentials, PublishError, PublishResult, Publisher};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

/// Publishes media through the destination's submission API.
///
/// `login` exchanges credentials for a bearer token that lives until `release`.
pub struct HttpPublisher {
    client: Client,
    base_url: String,
    target: String,
    token: RwLock<Option<SecretString>>,
}

impl HttpPublisher {
    pub fn new(base_url: String, target: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            target,
            token: RwLock::new(None),
        }
    }

    fn bearer(&self) -> Result<String, PublishError> {
        let token = self
            .token
            .read()
            .map_err(|e| PublishError::Api(e.to_string()))?;
        token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
            .ok_or(PublishError::NotLoggedIn)
    }

    fn set_token(&self, token: Option<SecretString>) {
        match self.token.write() {
            Ok(mut slot) => *slot = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    async fn check(response: Response, action: &str) -> Result<Response, PublishError> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PublishError::Auth(format!(
                "{} rejected: {}",
                action,
                response.status()
            ))),
            StatusCode::TOO_MANY_REQUESTS => Err(PublishError::RateLimited),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(PublishError::Api(format!("Failed to {}: {}", action, body)))
            }
            _ => Ok(response),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn login(&self, credentials: &Credentials) -> Result<(), PublishError> {
        let url = format!("{}/api/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &credentials.username,
                password: credentials.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let login: LoginResponse = Self::check(response, "log in")
            .await?
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        self.set_token(Some(SecretString::new(login.token.into())));
        tracing::info!(username = %credentials.username, "Logged in");
        Ok(())
    }

    async fn publish(&self, file_path: &Path, title: &str) -> Result<PublishResult, PublishError> {
        let bearer = self.bearer()?;

        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|e| PublishError::Media(format!("{}: {}", file_path.display(), e)))?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        let form = Form::new()
            .text("target", self.target.clone())
            .text("title", title.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/api/submit", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", bearer)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let submitted: SubmitResponse = Self::check(response, "submit")
            .await?
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(PublishResult {
            id: submitted.id,
            url: submitted.url,
        })
    }

    async fn comment_back_link(
        &self,
        published: &PublishResult,
        comment: &BackLinkComment,
    ) -> Result<(), PublishError> {
        let bearer = self.bearer()?;
        let url = format!(
            "{}/api/submissions/{}/comments",
            self.base_url, published.id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", bearer)
            .json(&CommentRequest {
                text: &comment.text,
            })
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Self::check(response, "comment").await?;
        Ok(())
    }

    async fn release(&self) {
        self.set_token(None);
    }

    fn platform(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            username: "relay".to_string(),
            password: SecretString::new("hunter2".into()),
        }
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(body_json(serde_json::json!({
                "username": "relay",
                "password": "hunter2"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "tok-1" })),
            )
            .mount(server)
            .await;
    }

    fn media_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("1700000000000_abc.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_login_then_publish() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_string_contains("Great day!!"))
            .and(body_string_contains("pics"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "s_42",
                "url": "https://dest.example.com/s/42"
            })))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));

        publisher.login(&credentials()).await.unwrap();
        let result = publisher
            .publish(&media_file(&dir), "Great day!!")
            .await
            .unwrap();

        assert_eq!(result.id, "s_42");
        assert_eq!(result.url.as_deref(), Some("https://dest.example.com/s/42"));
    }

    #[tokio::test]
    async fn test_publish_requires_login() {
        let dir = TempDir::new().unwrap();
        let publisher = HttpPublisher::new(
            "http://127.0.0.1:9".to_string(),
            "pics".to_string(),
            Duration::from_secs(5),
        );

        let result = publisher.publish(&media_file(&dir), "title").await;
        assert!(matches!(result, Err(PublishError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_release_ends_session() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server).await;

        let dir = TempDir::new().unwrap();
        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));

        publisher.login(&credentials()).await.unwrap();
        publisher.release().await;

        let result = publisher.publish(&media_file(&dir), "title").await;
        assert!(matches!(result, Err(PublishError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));

        let result = publisher.login(&credentials()).await;
        assert!(matches!(result, Err(PublishError::Auth(_))));
    }

    #[tokio::test]
    async fn test_publish_rate_limited() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let dir = TempDir::new().unwrap();
        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));
        publisher.login(&credentials()).await.unwrap();

        let result = publisher.publish(&media_file(&dir), "title").await;
        assert!(matches!(result, Err(PublishError::RateLimited)));
    }

    #[tokio::test]
    async fn test_missing_media_file() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server).await;

        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));
        publisher.login(&credentials()).await.unwrap();

        let result = publisher
            .publish(Path::new("/nonexistent/media.jpg"), "title")
            .await;
        assert!(matches!(result, Err(PublishError::Media(_))));
    }

    #[tokio::test]
    async fn test_comment_back_link() {
        let mock_server = MockServer::start().await;
        mount_login(&mock_server).await;

        Mock::given(method("POST"))
            .and(path("/api/submissions/s_42/comments"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_json(serde_json::json!({ "text": "Source: https://src/p/1" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let publisher =
            HttpPublisher::new(mock_server.uri(), "pics".to_string(), Duration::from_secs(5));
        publisher.login(&credentials()).await.unwrap();

        publisher
            .comment_back_link(
                &PublishResult {
                    id: "s_42".to_string(),
                    url: None,
                },
                &BackLinkComment {
                    source_uri: "https://src/p/1".to_string(),
                    text: "Source: https://src/p/1".to_string(),
                },
            )
            .await
            .unwrap();
    }
}
