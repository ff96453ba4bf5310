//! JSON feed page source

use async_trait::async_trait;
use feed_relay_domain::{ItemDetail, PageSource, PageSourceError};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Reads a feed exposed as JSON.
///
/// The feed location returns `{"items": [{"uri": ...}]}`, newest first. Each item URI
/// returns an [`ItemDetail`] document. Relative URIs are resolved against the
/// document that referenced them.
pub struct JsonPageSource {
    client: Client,
}

impl JsonPageSource {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feed-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, PageSourceError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PageSourceError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PageSourceError::NotFound(url.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PageSourceError::PageLoad(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PageSourceError::Parse(e.to_string()))
    }
}

fn parse_url(value: &str) -> Result<Url, PageSourceError> {
    Url::parse(value).map_err(|e| PageSourceError::Parse(format!("{}: {}", value, e)))
}

fn resolve(base: &Url, reference: &str) -> Result<String, PageSourceError> {
    base.join(reference)
        .map(|u| u.to_string())
        .map_err(|e| PageSourceError::Parse(format!("{}: {}", reference, e)))
}

#[derive(Deserialize)]
struct ListingResponse {
    #[serde(default)]
    items: Vec<ListingItem>,
}

#[derive(Deserialize)]
struct ListingItem {
    uri: String,
}

#[async_trait]
impl PageSource for JsonPageSource {
    async fn list_items(&self, location: &str) -> Result<Vec<String>, PageSourceError> {
        let base = parse_url(location)?;
        let listing: ListingResponse = self.get_json(&base).await?;

        listing
            .items
            .iter()
            .map(|item| resolve(&base, &item.uri))
            .collect()
    }

    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail, PageSourceError> {
        let url = parse_url(item_id)?;
        let mut detail: ItemDetail = self.get_json(&url).await?;

        detail.media_uris = detail
            .media_uris
            .iter()
            .map(|m| resolve(&url, m))
            .collect::<Result<_, _>>()?;

        tracing::debug!(
            item = %item_id,
            media = detail.media_uris.len(),
            is_video = detail.is_video,
            "Fetched item detail"
        );

        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> JsonPageSource {
        JsonPageSource::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_list_items_resolves_relative_uris() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feeds/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "uri": "/p/2" },
                    { "uri": "https://elsewhere.example.com/p/1" }
                ]
            })))
            .mount(&mock_server)
            .await;

        let items = source()
            .list_items(&format!("{}/feeds/alice", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(
            items,
            vec![
                format!("{}/p/2", mock_server.uri()),
                "https://elsewhere.example.com/p/1".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_detail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "media_uris": ["/media/2.jpg", "/media/3.jpg"],
                "caption": "alice: hello there",
                "captured_at": "2024-06-01T12:00:00Z"
            })))
            .mount(&mock_server)
            .await;

        let detail = source()
            .fetch_detail(&format!("{}/p/2", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(detail.media_uris.len(), 2);
        assert_eq!(
            detail.media_uris[0],
            format!("{}/media/2.jpg", mock_server.uri())
        );
        assert_eq!(detail.caption, "alice: hello there");
        assert!(!detail.is_video);
    }

    #[tokio::test]
    async fn test_detail_without_media_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "caption": "text only",
                "captured_at": "2024-06-01T12:00:00Z"
            })))
            .mount(&mock_server)
            .await;

        let detail = source()
            .fetch_detail(&format!("{}/p/3", mock_server.uri()))
            .await
            .unwrap();

        assert!(detail.media_uris.is_empty());
    }

    #[tokio::test]
    async fn test_missing_item() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = source()
            .fetch_detail(&format!("{}/p/4", mock_server.uri()))
            .await;

        assert!(matches!(result, Err(PageSourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_page_load_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let result = source().list_items(&mock_server.uri()).await;

        assert!(matches!(result, Err(PageSourceError::PageLoad(_))));
    }

    #[tokio::test]
    async fn test_malformed_detail() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p/5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let result = source()
            .fetch_detail(&format!("{}/p/5", mock_server.uri()))
            .await;

        assert!(matches!(result, Err(PageSourceError::Parse(_))));
    }

    #[tokio::test]
    async fn test_invalid_location() {
        let result = source().list_items("not a url").await;
        assert!(matches!(result, Err(PageSourceError::Parse(_))));
    }
}
