//! HTTP client for the ledger REST API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{ApiKey, NonceSource, SystemClock};
use crate::config::ApiConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{CanonicalEncoder, JsonEncoder, Params, PreparedRequest};

/// Response to a REST call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,

    /// Final request URL.
    pub url: String,

    /// Response body text.
    pub body: String,
}

impl ApiResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a `ClientError::Request`.
    pub fn error_for_status(self) -> ClientResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Request {
                status: self.status,
                url: self.url,
                body: self.body,
            })
        }
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// REST client that signs requests made with an API key.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    encoder: Arc<dyn CanonicalEncoder>,
    nonces: Arc<dyn NonceSource>,
}

impl RestClient {
    /// Create a client for `base_url` using the wall clock for nonces.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            encoder: Arc::new(JsonEncoder),
            nonces: Arc::new(SystemClock),
        })
    }

    /// Create a client from the API configuration.
    pub fn from_config(config: &ApiConfig) -> ClientResult<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Replace the canonical body encoder.
    pub fn with_encoder(mut self, encoder: Arc<dyn CanonicalEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Replace the nonce source.
    pub fn with_nonce_source(mut self, nonces: Arc<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Base URL endpoints are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build, and sign if a key is given, a request without sending it.
    pub fn prepare(
        &self,
        endpoint: &str,
        params: Option<Params>,
        api_key: Option<&ApiKey>,
    ) -> ClientResult<PreparedRequest> {
        PreparedRequest::build(
            &self.base_url,
            endpoint,
            params,
            api_key,
            self.nonces.as_ref(),
            self.encoder.as_ref(),
        )
    }

    /// Send a prepared request. The status is not checked.
    pub async fn send(&self, request: &PreparedRequest) -> ClientResult<ApiResponse> {
        let request_id = Uuid::new_v4();
        let start_time = Instant::now();

        info!(
            request_id = %request_id,
            method = %request.method,
            url = %request.url,
            authenticated = request.is_authenticated(),
            "Sending request"
        );

        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        if (200..300).contains(&status) {
            debug!(request_id = %request_id, status, duration_ms, "Request completed");
        } else {
            warn!(request_id = %request_id, status, url = %url, duration_ms, "Request failed");
        }

        Ok(ApiResponse { status, url, body })
    }

    /// Prepare and send a request, failing on a non-2xx status.
    pub async fn call(
        &self,
        endpoint: &str,
        params: Option<Params>,
        api_key: Option<&ApiKey>,
    ) -> ClientResult<ApiResponse> {
        let request = self.prepare(endpoint, params, api_key)?;
        self.send(&request).await?.error_for_status()
    }
}
