//! Canonical body encoding.
//!
//! The REST signature covers the exact bytes produced here, and those same
//! bytes are transmitted. Encoders are pluggable so the signing contract does
//! not depend on one serialization.

use serde_json::{Map, Value};

use crate::error::ClientError;

/// Request parameters, in insertion order.
pub type Params = Map<String, Value>;

/// Turns request parameters into the bytes that are signed and sent.
pub trait CanonicalEncoder: Send + Sync {
    /// Encode the parameters.
    fn encode(&self, params: &Params) -> Result<Vec<u8>, ClientError>;

    /// Content type of the encoded body.
    fn content_type(&self) -> &'static str;
}

/// Compact JSON with keys in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl CanonicalEncoder for JsonEncoder {
    fn encode(&self, params: &Params) -> Result<Vec<u8>, ClientError> {
        Ok(serde_json::to_vec(params)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_encoder_keeps_insertion_order() {
        let mut params = Params::new();
        params.insert("token".to_string(), json!("abc"));
        params.insert("nonce".to_string(), json!(1_700_000_000u64));
        params.insert("api_key".to_string(), json!("tok1"));

        let bytes = JsonEncoder.encode(&params).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"token":"abc","nonce":1700000000,"api_key":"tok1"}"#
        );
    }

    #[test]
    fn test_json_encoder_null_values() {
        let mut params = Params::new();
        params.insert("email".to_string(), Value::Null);

        let bytes = JsonEncoder.encode(&params).unwrap();
        assert_eq!(bytes, br#"{"email":null}"#);
        assert_eq!(JsonEncoder.content_type(), "application/json");
    }
}
