//! Remote object access: size lookups and (ranged) GETs.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RANGE};

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// An open response body.
pub struct RemoteBody {
    /// Length of the body about to be streamed, if the server declared it.
    pub content_length: Option<u64>,
    /// False when a ranged request was answered with the whole object.
    pub range_honoured: bool,
    /// The body, in order.
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBody")
            .field("content_length", &self.content_length)
            .field("range_honoured", &self.range_honoured)
            .finish_non_exhaustive()
    }
}

/// Where recordings are fetched from.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Total size of the object behind `link`, or `None` if the server does
    /// not say.
    async fn content_length(&self, link: &str) -> Result<Option<u64>>;

    /// Starts a GET of `link`. A non-zero `offset` requests
    /// `Range: bytes=<offset>-`.
    async fn open(&self, link: &str, offset: u64) -> Result<RemoteBody>;
}

/// [`RemoteSource`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpSource {
    /// Builds a client from the transfer settings.
    ///
    /// `timeout_secs` bounds connecting and each read, never a whole
    /// transfer, so long recordings stream as long as bytes keep arriving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the client cannot be constructed.
    pub fn new(config: &TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, config.retry_policy()))
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn head_length(&self, link: &str) -> Result<Option<u64>> {
        let response = self.client.head(link).send().await?.error_for_status()?;
        Ok(declared_length(response.headers()))
    }

    async fn get_length(&self, link: &str) -> Result<Option<u64>> {
        // The body is dropped unread; only the headers matter.
        let response = self.client.get(link).send().await?.error_for_status()?;
        Ok(declared_length(response.headers()))
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn content_length(&self, link: &str) -> Result<Option<u64>> {
        let operation = format!("size lookup of {link}");
        let size = self
            .retry
            .run(&operation, || async move {
                match self.head_length(link).await {
                    Ok(Some(size)) => Ok(Some(size)),
                    Ok(None) => self.get_length(link).await,
                    Err(e) => {
                        log::debug!("HEAD {link} failed ({e}), trying GET");
                        self.get_length(link).await
                    }
                }
            })
            .await?;
        log::debug!("Remote size of {link}: {size:?}");
        Ok(size)
    }

    async fn open(&self, link: &str, offset: u64) -> Result<RemoteBody> {
        let operation = format!("GET {link}");
        let response = self
            .retry
            .run(&operation, || async move {
                let mut request = self.client.get(link);
                if offset > 0 {
                    request = request.header(RANGE, format!("bytes={offset}-"));
                }
                Ok::<_, Error>(request.send().await?.error_for_status()?)
            })
            .await?;

        let range_honoured = offset == 0 || response.status() == StatusCode::PARTIAL_CONTENT;
        let content_length = declared_length(response.headers());
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from))
            .boxed();

        Ok(RemoteBody {
            content_length,
            range_honoured,
            chunks,
        })
    }
}

/// Reads `Content-Length`. Zero is treated as unknown.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&len| len > 0)
}
