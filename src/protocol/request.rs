//! Authenticated REST request construction.

use reqwest::Method;
use serde_json::Value;

use crate::auth::{ApiKey, NonceSource};
use crate::error::ClientError;

use super::canonical::{CanonicalEncoder, Params};

/// Header carrying the hex-encoded HMAC of the request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// A request ready to be transmitted.
///
/// When authenticated, `signature` is the MAC of exactly `body`.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// GET when there is no body, POST otherwise.
    pub method: Method,

    /// Full request URL.
    pub url: String,

    /// Encoded body, if any.
    pub body: Option<Vec<u8>>,

    /// Content type of `body`.
    pub content_type: Option<&'static str>,

    /// Nonce injected into the body (authenticated requests only).
    pub nonce: Option<u64>,

    /// Value of the `X-Signature` header (authenticated requests only).
    pub signature: Option<String>,
}

impl PreparedRequest {
    /// Build a request for `endpoint` under `base_url`.
    ///
    /// With an API key, `nonce` and `api_key` are inserted into the
    /// parameters before encoding, and the encoded bytes are signed.
    /// Without one, the parameters pass through untouched.
    pub fn build(
        base_url: &str,
        endpoint: &str,
        params: Option<Params>,
        api_key: Option<&ApiKey>,
        nonces: &dyn NonceSource,
        encoder: &dyn CanonicalEncoder,
    ) -> Result<Self, ClientError> {
        let url = join_url(base_url, endpoint);
        let mut params = params.unwrap_or_default();

        let mut nonce = None;
        let mut signer = None;
        if let Some(key) = api_key {
            // Fails on an empty secret before anything is serialized.
            signer = Some(key.signer()?);
            let value = nonces.next_nonce()?;
            params.insert("nonce".to_string(), Value::from(value));
            params.insert("api_key".to_string(), Value::from(key.token()));
            nonce = Some(value);
        }

        if params.is_empty() {
            return Ok(Self {
                method: Method::GET,
                url,
                body: None,
                content_type: None,
                nonce: None,
                signature: None,
            });
        }

        let body = encoder.encode(&params)?;
        let signature = signer.map(|s| s.sign(&body));

        Ok(Self {
            method: Method::POST,
            url,
            body: Some(body),
            content_type: Some(encoder.content_type()),
            nonce,
            signature,
        })
    }

    /// Whether this request carries a signature.
    pub fn is_authenticated(&self) -> bool {
        self.signature.is_some()
    }

    /// Headers to send with the request.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(content_type) = self.content_type {
            headers.push(("Content-Type", content_type.to_string()));
        }
        if let Some(signature) = &self.signature {
            headers.push((SIGNATURE_HEADER, signature.clone()));
        }
        headers
    }
}

/// Join a base URL and an endpoint with exactly one slash.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
