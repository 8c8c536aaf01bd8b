//! Integration tests for the authenticated socket session.
//!
//! Most tests run the session over a scripted in-memory transport: tests
//! push the packets a server would deliver and read back what the client
//! sent. The long-polling transport is checked against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wiremock::{
    matchers::{method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

use paydb_client::auth::{ApiKey, FixedNonce};
use paydb_client::error::{ClientError, ClientResult, SessionErrorKind};
use paydb_client::protocol::{EnginePacket, OpenHandshake, SocketPacket};
use paydb_client::socket::{
    DisconnectReason, PollingTransport, Session, SessionEvent, SessionHandle, SessionState,
    Transport,
};

const NAMESPACE: &str = "/paydb";

/// Transport fed from a channel. When the script ends the server closes.
struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<Vec<EnginePacket>>,
    outbound: mpsc::UnboundedSender<EnginePacket>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> ClientResult<OpenHandshake> {
        OpenHandshake::parse(
            r#"{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#,
        )
    }

    async fn send(&mut self, packets: Vec<EnginePacket>) -> ClientResult<()> {
        for packet in packets {
            let _ = self.outbound.send(packet);
        }
        Ok(())
    }

    async fn poll(&mut self) -> ClientResult<Vec<EnginePacket>> {
        Ok(self
            .inbound
            .recv()
            .await
            .unwrap_or_else(|| vec![EnginePacket::Close]))
    }

    async fn close(&mut self) -> ClientResult<()> {
        let _ = self.outbound.send(EnginePacket::Close);
        Ok(())
    }
}

/// Test server side of a running session.
struct TestServer {
    to_client: mpsc::UnboundedSender<Vec<EnginePacket>>,
    from_client: mpsc::UnboundedReceiver<EnginePacket>,
}

impl TestServer {
    fn deliver(&self, packets: &[&str]) {
        let packets = packets
            .iter()
            .map(|p| EnginePacket::Message(p.to_string()))
            .collect();
        self.to_client
            .send(packets)
            .expect("Session stopped polling");
    }

    async fn received(&mut self) -> EnginePacket {
        tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("Timed out waiting for client packet")
            .expect("Client transport dropped")
    }

    async fn received_socket_packet(&mut self) -> SocketPacket {
        match self.received().await {
            EnginePacket::Message(text) => SocketPacket::decode(&text).unwrap(),
            other => panic!("expected a message packet, got {:?}", other),
        }
    }
}

fn start() -> (TestServer, SessionHandle, JoinHandle<ClientResult<()>>) {
    start_in(NAMESPACE)
}

fn start_in(namespace: &str) -> (TestServer, SessionHandle, JoinHandle<ClientResult<()>>) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();

    let transport = ScriptedTransport { inbound, outbound };
    let (session, handle) = Session::new(transport, namespace, ApiKey::new("tok1", "s3cr3t"));
    let session = session.with_nonce_source(Arc::new(FixedNonce(1_700_000_000)));
    let task = tokio::spawn(session.run());

    (
        TestServer {
            to_client,
            from_client,
        },
        handle,
        task,
    )
}

async fn next_event(handle: &mut SessionHandle) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("Timed out waiting for session event")
        .expect("Session event channel closed")
}

/// Connect the namespace and consume the client's auth event.
async fn connect(server: &mut TestServer, handle: &mut SessionHandle) -> SocketPacket {
    let connect = server.received_socket_packet().await;
    assert_eq!(
        connect,
        SocketPacket::Connect {
            namespace: NAMESPACE.to_string(),
            data: None,
        }
    );

    server.deliver(&[r#"0/paydb,{"sid":"ns-sid"}"#]);
    handle.wait_for_auth().await.unwrap();
    assert_eq!(next_event(handle).await, SessionEvent::Connected);

    server.received_socket_packet().await
}

#[tokio::test]
async fn test_auth_emitted_on_connect() {
    let (mut server, mut handle, task) = start();
    assert_eq!(handle.state(), SessionState::Connecting);

    let auth = connect(&mut server, &mut handle).await;
    match auth {
        SocketPacket::Event {
            namespace,
            name,
            args,
            ack_id,
        } => {
            assert_eq!(namespace, NAMESPACE);
            assert_eq!(name, "auth");
            assert_eq!(ack_id, None);
            assert_eq!(
                args,
                vec![json!({
                    "signature": "e9a04b295550530d7a3ffd02fbca6cf7cc859115f4c5bc624fd76d03236fad10",
                    "api_key": "tok1",
                    "nonce": 1_700_000_000u64,
                })]
            );
        }
        other => panic!("expected auth event, got {:?}", other),
    }
    assert_eq!(handle.state(), SessionState::AuthSent);

    drop(server);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Disconnected(DisconnectReason::Server)
    );
    task.await.unwrap().unwrap();
    assert_eq!(handle.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_events_forwarded_in_order() {
    let (mut server, mut handle, task) = start();
    connect(&mut server, &mut handle).await;

    server.deliver(&[
        r#"2/paydb,["info",{"balance":1250}]"#,
        r#"2/paydb,["tx",{"token":"abc","status":"completed"}]"#,
        r#"2/paydb,["custom",1,"two"]"#,
    ]);

    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Info(json!({"balance": 1250}))
    );
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Transaction(json!({"token": "abc", "status": "completed"}))
    );
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Other {
            name: "custom".to_string(),
            args: vec![json!(1), Value::String("two".to_string())],
        }
    );

    server.deliver(&["1/paydb,"]);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Disconnected(DisconnectReason::Server)
    );
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_events_before_auth_are_dropped() {
    let (mut server, mut handle, task) = start();
    server.received_socket_packet().await;

    server.deliver(&[
        r#"2/paydb,["tx",{"token":"early"}]"#,
        r#"0/paydb,{"sid":"ns-sid"}"#,
        r#"2/paydb,["tx",{"token":"late"}]"#,
    ]);

    assert_eq!(next_event(&mut handle).await, SessionEvent::Connected);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Transaction(json!({"token": "late"}))
    );

    drop(server);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_other_namespace_ignored() {
    let (mut server, mut handle, task) = start();
    connect(&mut server, &mut handle).await;

    server.deliver(&[
        r#"2/admin,["tx",{"token":"elsewhere"}]"#,
        r#"2/paydb,["tx",{"token":"mine"}]"#,
    ]);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Transaction(json!({"token": "mine"}))
    );

    drop(server);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_ping_answered_with_pong() {
    let (mut server, mut handle, task) = start();
    connect(&mut server, &mut handle).await;

    server
        .to_client
        .send(vec![EnginePacket::Ping(String::new())])
        .unwrap();
    assert_eq!(server.received().await, EnginePacket::Pong(String::new()));

    drop(server);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connect_error_fails_session() {
    let (mut server, mut handle, task) = start();
    server.received_socket_packet().await;

    server.deliver(&[r#"4/paydb,{"message":"Not authorized"}"#]);

    let result = task.await.unwrap();
    match result {
        Err(ClientError::Session {
            kind: SessionErrorKind::ConnectRejected { namespace, message },
        }) => {
            assert_eq!(namespace, NAMESPACE);
            assert_eq!(message, "Not authorized");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    assert!(matches!(
        handle.wait_for_auth().await,
        Err(ClientError::Session {
            kind: SessionErrorKind::ClosedBeforeAuth
        })
    ));
    assert!(matches!(
        next_event(&mut handle).await,
        SessionEvent::Disconnected(DisconnectReason::Error(_))
    ));
    assert_eq!(handle.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_client_close_disconnects() {
    let (mut server, mut handle, task) = start();
    connect(&mut server, &mut handle).await;

    handle.close();

    assert_eq!(
        server.received_socket_packet().await,
        SocketPacket::Disconnect {
            namespace: NAMESPACE.to_string(),
        }
    );
    assert_eq!(server.received().await, EnginePacket::Close);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Disconnected(DisconnectReason::Client)
    );
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_state_changes_are_observable() {
    let (mut server, mut handle, task) = start();
    let mut states = handle.watch_state();

    connect(&mut server, &mut handle).await;
    assert_eq!(*states.borrow_and_update(), SessionState::AuthSent);

    drop(server);
    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), SessionState::Closed);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_event_ack_requested_by_server() {
    let (mut server, mut handle, task) = start();
    connect(&mut server, &mut handle).await;

    server.deliver(&[r#"2/paydb,7["tx",{"token":"abc"}]"#]);

    assert_eq!(
        server.received_socket_packet().await,
        SocketPacket::Ack {
            namespace: NAMESPACE.to_string(),
            ack_id: 7,
            args: Vec::new(),
        }
    );
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Transaction(json!({"token": "abc"}))
    );

    drop(server);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_namespace_without_slash_is_normalized() {
    let (mut server, mut handle, task) = start_in("paydb");

    let auth = connect(&mut server, &mut handle).await;
    assert_eq!(auth.namespace(), NAMESPACE);

    drop(server);
    task.await.unwrap().unwrap();
}

/// Mount a one-shot poll response, matched in mount order.
async fn mount_poll(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_polling_transport_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/socket.io/"))
        .and(query_param("EIO", "4"))
        .and(query_param("transport", "polling"))
        .and(query_param_is_missing("sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"0{"sid":"eio-sid","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_poll(&server, r#"40/paydb,{"sid":"ns-sid"}"#).await;
    mount_poll(&server, "2\u{1e}42/paydb,[\"tx\",{\"a\":1}]").await;
    mount_poll(&server, "1").await;
    Mock::given(method("POST"))
        .and(path("/socket.io/"))
        .and(query_param("sid", "eio-sid"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(3)
        .mount(&server)
        .await;

    let transport = PollingTransport::new(&server.uri().replace("http://", "ws://")).unwrap();
    assert_eq!(transport.endpoint(), format!("{}/socket.io/", server.uri()));

    let (session, mut handle) = Session::new(transport, NAMESPACE, ApiKey::new("tok1", "s3cr3t"));
    let session = session.with_nonce_source(Arc::new(FixedNonce(1_700_000_000)));
    tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .expect("Session did not finish")
        .unwrap();

    assert_eq!(next_event(&mut handle).await, SessionEvent::Connected);
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Transaction(json!({"a": 1}))
    );
    assert_eq!(
        next_event(&mut handle).await,
        SessionEvent::Disconnected(DisconnectReason::Server)
    );

    let posted: Vec<String> = server
        .received_requests()
        .await
        .expect("Request recording disabled")
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| String::from_utf8(r.body).unwrap())
        .collect();
    assert_eq!(posted.len(), 3);
    assert_eq!(posted[0], "40/paydb,");
    assert_eq!(
        posted[1],
        concat!(
            r#"42/paydb,["auth",{"signature":"e9a04b295550530d7a3ffd02fbca6cf7cc859115f4c5bc624fd76d03236fad10","#,
            r#""api_key":"tok1","nonce":1700000000}]"#
        )
    );
    assert_eq!(posted[2], "3");
}
