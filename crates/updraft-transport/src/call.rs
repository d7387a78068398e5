//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST transport adapter for the deployment backend."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::io::Write;
use std::time::Duration;

use reqwest::header;
use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use updraft_api::wire::ErrorResponse;
use updraft_common::config::RetryConfig;
use updraft_common::metrics::TRANSPORT_RETRIES_TOTAL;

use crate::error::TransportError;

/// Credential attached to a call: the account-level token or the
/// update-scoped lease token, selected per operation.
#[derive(Clone)]
pub enum AccessToken {
    /// Long-lived account token.
    Account(String),
    /// Lease token scoped to one in-progress update.
    Lease(String),
}

impl AccessToken {
    fn header_value(&self) -> String {
        match self {
            AccessToken::Account(token) | AccessToken::Lease(token) => format!("token {token}"),
        }
    }
}

impl std::fmt::Debug for AccessToken {
    // Tokens are credentials; keep their values out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessToken::Account(_) => f.write_str("AccessToken::Account(..)"),
            AccessToken::Lease(_) => f.write_str("AccessToken::Lease(..)"),
        }
    }
}

/// Whether a call may be replayed blindly after a transient failure.
///
/// Declared by the operation author; the retry loop consults nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    /// Safe to retry: replaying the call converges on the same server state.
    Retryable,
    /// Retrying could duplicate server-side effects; one attempt only.
    NonRetryable,
}

/// Per-call transport options.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub idempotency: Idempotency,
    /// Gzip-compress the request body (large checkpoint/event payloads).
    pub gzip: bool,
}

impl CallOptions {
    /// Single-attempt call without body compression.
    pub fn non_retryable() -> Self {
        Self {
            idempotency: Idempotency::NonRetryable,
            gzip: false,
        }
    }

    /// Retry-safe call without body compression.
    pub fn retryable() -> Self {
        Self {
            idempotency: Idempotency::Retryable,
            gzip: false,
        }
    }

    /// Retry-safe call with a gzip-compressed body.
    pub fn retryable_gzip() -> Self {
        Self {
            idempotency: Idempotency::Retryable,
            gzip: true,
        }
    }
}

/// Bounded exponential backoff applied to retry-safe calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

/// REST call primitive for the deployment backend.
///
/// Serializes the request body once, attaches the selected credential, and
/// retries calls declared [`Idempotency::Retryable`] on transient failures
/// with bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RestCaller {
    http: reqwest::Client,
    base: String,
    retry: RetryPolicy,
}

impl RestCaller {
    /// Construct a caller for the given backend base URL.
    pub fn new(
        api_url: impl Into<String>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let mut base = api_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Ok(Self { http, base, retry })
    }

    /// Base URL this caller talks to.
    pub fn api_url(&self) -> &str {
        &self.base
    }

    /// Issue a call and deserialize the JSON response body.
    pub async fn call<B, R>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        token: &AccessToken,
        options: CallOptions,
    ) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self
            .execute(method, path, query, body, token, options)
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Issue a call whose response body is irrelevant.
    pub async fn call_unit<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        token: &AccessToken,
        options: CallOptions,
    ) -> Result<(), TransportError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(method, path, query, body, token, options)
            .await
            .map(|_| ())
    }

    /// Upload raw bytes to an absolute (typically presigned) URL. No backend
    /// credential is attached.
    pub async fn put_raw(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        let response = self.http.put(url).body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(classify_rejection(status, &bytes));
        }
        Ok(())
    }

    /// Download raw bytes from an absolute URL. No backend credential is
    /// attached.
    pub async fn get_raw(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(classify_rejection(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        token: &AccessToken,
        options: CallOptions,
    ) -> Result<Vec<u8>, TransportError>
    where
        B: Serialize + ?Sized,
    {
        let payload = match body {
            Some(value) => {
                let json = serde_json::to_vec(value)?;
                Some(if options.gzip { gzip_bytes(&json)? } else { json })
            }
            None => None,
        };

        let attempts = match options.idempotency {
            Idempotency::Retryable => self.retry.max_attempts.max(1),
            Idempotency::NonRetryable => 1,
        };
        let url = format!("{}{}", self.base, path);
        let mut backoff = self.retry.initial_backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .send_once(&method, &url, query, payload.as_deref(), token, options.gzip)
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(%url, attempt, error = %err, "retrying retry-safe call");
                    TRANSPORT_RETRIES_TOTAL.inc();
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        query: &[(&str, String)],
        payload: Option<&[u8]>,
        token: &AccessToken,
        gzip: bool,
    ) -> Result<Vec<u8>, TransportError> {
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        request = request.header(header::AUTHORIZATION, token.header_value());
        if let Some(bytes) = payload {
            request = request.header(header::CONTENT_TYPE, "application/json");
            if gzip {
                request = request.header(header::CONTENT_ENCODING, "gzip");
            }
            request = request.body(bytes.to_vec());
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(classify_rejection(status, &bytes));
        }
        Ok(bytes.to_vec())
    }
}

fn classify_rejection(status: StatusCode, body: &[u8]) -> TransportError {
    let message = match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(error) => error.message,
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_owned()
            } else {
                text.to_owned()
            }
        }
    };
    TransportError::Api {
        status: status.as_u16(),
        message,
    }
}

fn gzip_bytes(input: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn gzip_round_trip() {
        let compressed = gzip_bytes(b"{\"deployment\":{}}").unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut output = String::new();
        decoder.read_to_string(&mut output).unwrap();
        assert_eq!(output, "{\"deployment\":{}}");
    }

    #[test]
    fn rejection_prefers_structured_error_body() {
        let body = serde_json::to_vec(&ErrorResponse {
            code: 400,
            message: "Bad Request: Stack still contains resources.".to_owned(),
        })
        .unwrap();
        let err = classify_rejection(StatusCode::BAD_REQUEST, &body);
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request: Stack still contains resources.");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejection_falls_back_to_canonical_reason() {
        let err = classify_rejection(StatusCode::NOT_FOUND, b"");
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn token_header_uses_token_scheme() {
        let account = AccessToken::Account("acct".to_owned());
        assert_eq!(account.header_value(), "token acct");
        let lease = AccessToken::Lease("lease".to_owned());
        assert_eq!(lease.header_value(), "token lease");
    }
}
