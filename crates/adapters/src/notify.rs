//! Webhook notifier

use async_trait::async_trait;
use feed_relay_domain::{Notifier, NotifyError, Post};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Posts a short message about each post decision to a chat webhook
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: SecretString, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            webhook_url: Some(webhook_url),
        }
    }

    /// Create a disabled notifier
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            webhook_url: None,
        }
    }

    fn format_message(post: &Post) -> String {
        match post.reject_reason() {
            None => format!("Relayed \"{}\" from {}", post.title, post.source_uri),
            Some(reason) => format!("Skipped {} ({})", post.source_uri, reason),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload {
    content: String,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, post: &Post) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let response = self
            .client
            .post(url.expose_secret())
            .json(&WebhookPayload {
                content: Self::format_message(post),
            })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        tracing::debug!(item = %post.source_uri, "Notification delivered");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_relay_domain::{ItemDetail, RejectReason, TitleOptions, Verdict};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use time::macros::datetime;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(verdict: Verdict) -> Post {
        let mut post = Post::from_detail(
            "https://src/p/1",
            ItemDetail {
                media_uris: vec!["https://cdn/1.jpg".to_string()],
                caption: "alice: sunny".to_string(),
                captured_at: datetime!(2024-06-01 12:00:00 UTC),
                is_video: false,
            },
            &TitleOptions::default(),
            &mut StdRng::seed_from_u64(0),
        );
        post.decide(verdict);
        post
    }

    #[tokio::test]
    async fn test_notify_published() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({
                "content": "Relayed \"sunny\" from https://src/p/1"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            SecretString::new(format!("{}/hook", mock_server.uri()).into()),
            Duration::from_secs(5),
        );

        notifier.notify(&post(Verdict::Postable)).await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_skipped_includes_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "content": "Skipped https://src/p/1 (stale)"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            SecretString::new(mock_server.uri().into()),
            Duration::from_secs(5),
        );

        notifier
            .notify(&post(Verdict::Rejected(RejectReason::Stale)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_delivery() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            SecretString::new(mock_server.uri().into()),
            Duration::from_secs(5),
        );

        let result = notifier.notify(&post(Verdict::Postable)).await;
        assert!(matches!(result, Err(NotifyError::Status(500))));
    }

    #[tokio::test]
    async fn test_disabled_notifier() {
        let notifier = WebhookNotifier::disabled();
        assert!(!notifier.is_enabled());
        assert!(notifier.notify(&post(Verdict::Postable)).await.is_ok());
    }
}
