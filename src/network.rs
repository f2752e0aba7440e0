//! HTTP fetch layer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

/// Browser signatures rotated per request so traffic does not present a
/// single client identity.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/89.0.4389.82 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:91.0) Gecko/20100101 Firefox/91.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.96 Safari/537.36",
];

const RETRY_BACKOFF_MS: u64 = 500;
const MAX_REDIRECTS: usize = 5;

/// Body of a successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub status: u16,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Transient errors worth another attempt. Everything else is terminal
    /// for the URL in question.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connect(_) | FetchError::Network(_) => true,
            FetchError::Status(code) => *code >= 500,
            FetchError::Client(_) | FetchError::InvalidUrl(_) | FetchError::Body(_) => false,
        }
    }
}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = Result<FetchedPage, FetchError>> + Send + 'a>>;

/// Seam between the fetch pool and the network, so tests can drive a crawl
/// without sockets.
pub trait PageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// reqwest-backed fetcher used by the real crawl.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retries: u32,
}

impl HttpClient {
    /// Build the client. `timeout` bounds each whole request when present;
    /// without it a slow server can hold a worker slot indefinitely.
    pub fn new(timeout: Option<Duration>, retries: u32) -> Result<Self, FetchError> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, retries })
    }

    /// GET one page, retrying transient failures up to the configured count.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    debug!(%url, error = %e, attempt, "retrying fetch");
                    sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        // Stored URLs are percent-decoded; parsing re-encodes the path
        // before it goes on the wire.
        let request_url = Url::parse(url)?;

        let response = self
            .client
            .get(request_url)
            .header(reqwest::header::USER_AGENT, Self::pick_user_agent())
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(FetchedPage {
            body,
            status: status.as_u16(),
        })
    }

    fn pick_user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    fn classify(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() {
            FetchError::Connect(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }
}

impl PageFetcher for HttpClient {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(HttpClient::fetch(self, url))
    }
}
