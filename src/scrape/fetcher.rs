use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppError, FetchError};
use crate::types::{RawEntry, ScrapeResponse};

/// One request to the scrape endpoint for one page of one search URL.
#[async_trait]
pub trait PageFetch: Send + Sync {
    async fn fetch(
        &self,
        scrape_url: &str,
        query_url: &str,
        page: u32,
    ) -> std::result::Result<Vec<RawEntry>, FetchError>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetch for HttpPageFetcher {
    async fn fetch(
        &self,
        scrape_url: &str,
        query_url: &str,
        page: u32,
    ) -> std::result::Result<Vec<RawEntry>, FetchError> {
        let body = serde_json::json!({
            "page": page,
            "airbnbUrl": query_url,
        });

        let resp = self
            .client
            .post(scrape_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus { status: status.as_u16() });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let parsed: ScrapeResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(page, entries = parsed.data.len(), "scrape page fetched");
        Ok(parsed.data)
    }
}
