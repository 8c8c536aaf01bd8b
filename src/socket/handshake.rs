//! Socket session authentication payload.

use serde::{Deserialize, Serialize};

use crate::auth::ApiKey;
use crate::error::ClientResult;
use crate::protocol::SocketPacket;

/// Name of the authentication event.
pub const AUTH_EVENT: &str = "auth";

/// Payload of the `auth` event.
///
/// `signature` is the MAC of the nonce's decimal string, not of a JSON
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub signature: String,
    pub api_key: String,
    pub nonce: u64,
}

impl AuthPayload {
    /// Sign `nonce` with the key's secret.
    pub fn new(api_key: &ApiKey, nonce: u64) -> ClientResult<Self> {
        let signature = api_key.signer()?.sign(nonce.to_string().as_bytes());
        Ok(Self {
            signature,
            api_key: api_key.token().to_string(),
            nonce,
        })
    }

    /// Wrap the payload in an `auth` event for `namespace`.
    pub fn to_packet(&self, namespace: &str) -> ClientResult<SocketPacket> {
        Ok(SocketPacket::event(
            namespace,
            AUTH_EVENT,
            serde_json::to_value(self)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign;

    #[test]
    fn test_payload_signature() {
        let key = ApiKey::new("tok1", "s3cr3t");
        let payload = AuthPayload::new(&key, 1_700_000_000).unwrap();

        assert_eq!(
            payload.signature,
            "e9a04b295550530d7a3ffd02fbca6cf7cc859115f4c5bc624fd76d03236fad10"
        );
        assert_eq!(payload.signature, sign(b"s3cr3t", b"1700000000").unwrap());
        assert_eq!(payload.api_key, "tok1");
        assert_eq!(payload.nonce, 1_700_000_000);
    }

    #[test]
    fn test_payload_fields() {
        let key = ApiKey::new("tok1", "s3cr3t");
        let value = serde_json::to_value(AuthPayload::new(&key, 5).unwrap()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["api_key", "nonce", "signature"]);
        assert!(object["nonce"].is_u64());
    }

    #[test]
    fn test_packet_encoding() {
        let key = ApiKey::new("tok1", "s3cr3t");
        let payload = AuthPayload::new(&key, 1_700_000_000).unwrap();
        let text = payload.to_packet("/paydb").unwrap().encode().unwrap();

        assert_eq!(
            text,
            format!(
                r#"2/paydb,["auth",{{"signature":"{}","api_key":"tok1","nonce":1700000000}}]"#,
                payload.signature
            )
        );
    }
}
