//! HTTP client for streaming requests

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::config::ChannelConfig;
use crate::error::{ClientError, Result};
use crate::streaming::{
    AbortSignal, ChunkedStreamReader, FnObserver, StreamError, StreamObserver, StreamOutcome,
    StreamResult,
};

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for reading one streaming response
const STREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Pushfeed backend client
///
/// Issues streaming requests and derives WebSocket endpoints for channels
/// from the same base URL.
#[derive(Debug, Clone)]
pub struct PushfeedClient {
    client: Client,
    base_url: Url,
}

impl PushfeedClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the backend (e.g., "http://localhost:8080")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Create a new client that sends a bearer token with every request
    pub fn with_bearer_token(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let header_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::InvalidHeader(format!("Invalid auth token: {}", e)))?;
        headers.insert(AUTHORIZATION, header_value);

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// WebSocket URL for `path` on the same host (`http` → `ws`, `https` → `wss`)
    pub fn channel_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| {
            ClientError::Config(format!("cannot use {} as a channel URL", self.base_url))
        })?;
        Ok(url)
    }

    /// Channel configuration for `path` with the default policy
    pub fn channel_config(&self, path: &str) -> Result<ChannelConfig> {
        Ok(ChannelConfig::new(self.channel_url(path)?.to_string()))
    }

    /// POST `body` to `path` and read the streaming response
    ///
    /// Fails only if the response never started; failures while reading the
    /// body are reported through `on_error` and the returned outcome.
    #[instrument(skip(self, body, on_increment, on_complete, on_error))]
    pub async fn stream_request<B, I, C, F>(
        &self,
        path: &str,
        body: &B,
        on_increment: I,
        on_complete: C,
        on_error: F,
    ) -> StreamResult<StreamOutcome>
    where
        B: Serialize + ?Sized,
        I: FnMut(&str, &str),
        C: FnMut(&str),
        F: FnMut(&StreamError, &str),
    {
        let mut observer = FnObserver::new(on_increment, on_complete, on_error);
        self.stream_with(path, body, &mut observer, None).await
    }

    /// Like [`stream_request`](Self::stream_request) with an observer and an
    /// optional abort signal
    #[instrument(skip(self, body, observer, abort))]
    pub async fn stream_with<B, O>(
        &self,
        path: &str,
        body: &B,
        observer: &mut O,
        abort: Option<AbortSignal>,
    ) -> StreamResult<StreamOutcome>
    where
        B: Serialize + ?Sized,
        O: StreamObserver + ?Sized,
    {
        let url = self.base_url.join(path)?;
        debug!("Opening stream at {}", url);

        let request = self
            .client
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .timeout(STREAM_TIMEOUT)
            .json(body)
            .send();

        let response = match &abort {
            Some(signal) => {
                let mut signal = signal.clone();
                tokio::select! {
                    _ = signal.aborted() => return Err(StreamError::Cancelled),
                    response = request => response?,
                }
            }
            None => request.await?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(extract_error(response, status).await);
        }

        let mut reader = ChunkedStreamReader::new();
        if let Some(signal) = abort {
            reader = reader.with_abort(signal);
        }
        Ok(reader.read(response.bytes_stream(), observer).await)
    }
}

/// Turn a failed response into a [`StreamError::Server`]
async fn extract_error(response: reqwest::Response, status: StatusCode) -> StreamError {
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(err) => err.error,
        Err(_) if !text.trim().is_empty() => text.trim().to_string(),
        Err(_) => format!("HTTP {}", status),
    };

    StreamError::Server {
        status: status.as_u16(),
        message,
    }
}
