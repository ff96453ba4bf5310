//! Page source adapters

mod json;

pub use json::JsonPageSource;

use async_trait::async_trait;
use feed_relay_domain::{ItemDetail, PageSource, PageSourceError};

/// Page source that lists nothing, for wiring checks without a live feed
pub struct StubPageSource;

impl StubPageSource {
    pub fn empty() -> Self {
        Self
    }
}

#[async_trait]
impl PageSource for StubPageSource {
    async fn list_items(&self, _location: &str) -> Result<Vec<String>, PageSourceError> {
        Ok(vec![])
    }

    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail, PageSourceError> {
        Err(PageSourceError::NotFound(item_id.to_string()))
    }
}
