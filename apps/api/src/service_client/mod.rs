/// Service client: the single point of entry for every call to the external
/// recognition and language services.
///
/// All three services authenticate with the same subscription-key header and
/// report errors as `{"error": {"code", "message"}}`, so one client covers them.
/// Backends own the URLs and response shapes; this module owns transport,
/// retries and error decoding.
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Response is missing the '{0}' header")]
    MissingHeader(&'static str),

    #[error("Service still unavailable after {retries} retries")]
    RetriesExhausted { retries: u32 },
}

impl ServiceError {
    /// True when the service could not be reached or kept answering 429/5xx.
    pub fn is_transport(&self) -> bool {
        match self {
            ServiceError::Http(_) | ServiceError::RetriesExhausted { .. } => true,
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            ServiceError::Parse(_) | ServiceError::MissingHeader(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceErrorEnvelope {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    key: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl ServiceClient {
    pub fn new(key: String, max_retries: u32) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            key,
            max_retries,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Uploads a document for asynchronous analysis and returns the
    /// `Operation-Location` header the service hands back.
    pub async fn submit_document(&self, url: &str, document: Bytes) -> Result<String, ServiceError> {
        let response = self
            .send(|| {
                self.client
                    .post(url)
                    .header("content-type", "application/octet-stream")
                    .body(document.clone())
            })
            .await?;

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(ServiceError::MissingHeader(OPERATION_LOCATION_HEADER))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let response = self.send(|| self.client.get(url)).await?;
        decode_json(response).await
    }

    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self.send(|| self.client.post(url).json(body)).await?;
        decode_json(response).await
    }

    /// Sends a request, retrying on connection errors, 429 and 5xx with
    /// exponential backoff (1s, 2s, 4s...). Other failures return immediately.
    async fn send<F>(&self, build: F) -> Result<Response, ServiceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = self.max_retries + 1;
        let mut last_error: Option<ServiceError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry_base_delay * (1u32 << (attempt - 1).min(6));
                warn!(
                    "Service call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build()
                .header(SUBSCRIPTION_KEY_HEADER, &self.key)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ServiceError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Service returned {}: {}", status, body);
                last_error = Some(ServiceError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::Api {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            debug!("Service call succeeded with status {}", status);
            return Ok(response);
        }

        Err(last_error.unwrap_or(ServiceError::RetriesExhausted {
            retries: self.max_retries,
        }))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(ServiceError::Parse)
}

/// Pulls `error.message` out of a service error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ServiceErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Joins a configured endpoint and a service path without doubling the slash.
pub fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
