//! Socket.IO v5 packets carried inside Engine.IO messages.
//!
//! Text form: `<type>[<namespace>,][<ack id>][<json data>]`, where the
//! namespace is omitted for the root namespace `/`.

use serde_json::Value;

use crate::error::ClientError;

/// The root namespace.
pub const ROOT_NAMESPACE: &str = "/";

/// A decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        args: Vec<Value>,
        ack_id: Option<u64>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Build an event packet with a single argument.
    pub fn event(namespace: &str, name: &str, data: Value) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            name: name.to_string(),
            args: vec![data],
            ack_id: None,
        }
    }

    /// Namespace the packet belongs to.
    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Encode to the text form carried in an Engine.IO message.
    pub fn encode(&self) -> Result<String, ClientError> {
        let (kind, ack_id, data) = match self {
            SocketPacket::Connect { data, .. } => ('0', None, data.clone()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event {
                name, args, ack_id, ..
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', *ack_id, Some(Value::Array(items)))
            }
            SocketPacket::Ack { ack_id, args, .. } => {
                ('3', Some(*ack_id), Some(Value::Array(args.clone())))
            }
            SocketPacket::ConnectError { data, .. } => ('4', None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);

        let namespace = self.namespace();
        if namespace != ROOT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&serde_json::to_string(&data)?);
        }

        Ok(out)
    }

    /// Decode the text form.
    pub fn decode(text: &str) -> Result<Self, ClientError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| ClientError::invalid_packet("empty socket packet"))?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest;
                    rest = "";
                    ns.to_string()
                }
            }
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ClientError::invalid_packet(format!("bad ack id: {}", e)))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut items = match data {
                    Some(Value::Array(items)) => items,
                    _ => return Err(ClientError::invalid_packet("event data must be an array")),
                };
                if items.is_empty() {
                    return Err(ClientError::invalid_packet("event without a name"));
                }
                let name = match items.remove(0) {
                    Value::String(name) => name,
                    _ => return Err(ClientError::invalid_packet("event name must be a string")),
                };
                Ok(SocketPacket::Event {
                    namespace,
                    name,
                    args: items,
                    ack_id,
                })
            }
            '3' => {
                let ack_id =
                    ack_id.ok_or_else(|| ClientError::invalid_packet("ack without an id"))?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    _ => return Err(ClientError::invalid_packet("ack data must be an array")),
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, data }),
            '5' | '6' => Err(ClientError::invalid_packet(
                "binary socket packets are not supported",
            )),
            other => Err(ClientError::invalid_packet(format!(
                "unknown socket packet type '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_connect() {
        let packet = SocketPacket::Connect {
            namespace: "/paydb".to_string(),
            data: None,
        };
        assert_eq!(packet.encode().unwrap(), "0/paydb,");

        let root = SocketPacket::Connect {
            namespace: "/".to_string(),
            data: None,
        };
        assert_eq!(root.encode().unwrap(), "0");
    }

    #[test]
    fn test_encode_auth_event() {
        let packet = SocketPacket::event(
            "/paydb",
            "auth",
            json!({"signature": "ab", "api_key": "tok1", "nonce": 5}),
        );
        assert_eq!(
            packet.encode().unwrap(),
            r#"2/paydb,["auth",{"signature":"ab","api_key":"tok1","nonce":5}]"#
        );
    }

    #[test]
    fn test_decode_connect_ack() {
        let packet = SocketPacket::decode(r#"0/paydb,{"sid":"xyz"}"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Connect {
                namespace: "/paydb".to_string(),
                data: Some(json!({"sid": "xyz"})),
            }
        );
    }

    #[test]
    fn test_decode_event() {
        let packet = SocketPacket::decode(r#"2/paydb,["tx",{"token":"abc","amount":100}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/paydb".to_string(),
                name: "tx".to_string(),
                args: vec![json!({"token": "abc", "amount": 100})],
                ack_id: None,
            }
        );
    }

    #[test]
    fn test_decode_event_with_ack_root_namespace() {
        let packet = SocketPacket::decode(r#"212["info","hello"]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".to_string(),
                name: "info".to_string(),
                args: vec![json!("hello")],
                ack_id: Some(12),
            }
        );
    }

    #[test]
    fn test_decode_disconnect_and_error() {
        assert_eq!(
            SocketPacket::decode("1/paydb,").unwrap(),
            SocketPacket::Disconnect {
                namespace: "/paydb".to_string()
            }
        );
        assert_eq!(
            SocketPacket::decode(r#"4/paydb,{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError {
                namespace: "/paydb".to_string(),
                data: Some(json!({"message": "Not authorized"})),
            }
        );
    }

    #[test]
    fn test_decode_invalid() {
        assert!(SocketPacket::decode("").is_err());
        assert!(SocketPacket::decode("2/paydb,{}").is_err());
        assert!(SocketPacket::decode("2[]").is_err());
        assert!(SocketPacket::decode("2[1]").is_err());
        assert!(SocketPacket::decode("51-[\"x\"]").is_err());
    }
}
