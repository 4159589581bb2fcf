//! HTTP feed fetching behind a small trait so the pipeline tests can swap
//! in canned bytes. One bounded request per source, with a single alternate
//! user-agent retry for feeds that gate on UA.

use async_trait::async_trait;
use thiserror::Error;

const PRIMARY_UA: &str = "newsdesk/0.1 (+https://github.com/newsdesk/newsdesk)";
const ALTERNATE_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait FeedFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(timeout_ms.min(10_000)))
            .build()?;
        Ok(Self { client })
    }

    async fn get_with_ua(&self, url: &str, ua: &str) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .header(reqwest::header::USER_AGENT, ua)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport(e.to_string())
                }
            })
    }
}

#[async_trait]
impl FeedFetch for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        let mut resp = self.get_with_ua(url, PRIMARY_UA).await?;

        // Some hosts 403/429 the default agent; one retry with a browser UA.
        if matches!(resp.status().as_u16(), 403 | 429) {
            resp = self.get_with_ua(url, ALTERNATE_UA).await?;
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(FetchedFeed {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
