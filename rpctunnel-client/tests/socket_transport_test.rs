//! WebSocket transport tests
//!
//! Calls over the persistent connection: correlation by id, queueing
//! before the handshake, and teardown.

mod common;

use common::{eventually, mock_error_response, mock_response, MockServer};
use rpctunnel_client::{ConnectionState, RpcTunnel, TransportKind};
use rpctunnel_core::{Argument, Error, TypeDescriptor, Value};
use serde_json::json;

#[tokio::test]
async fn test_socket_call() {
    let mut server = MockServer::builder()
        .on_socket(|envelope| vec![mock_response(&envelope["id"], envelope["params"][0].clone())])
        .start()
        .await;

    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let echoed = tunnel
        .call("ns1.echo", vec![Argument::value("hi")], TypeDescriptor::String)
        .await
        .unwrap();
    assert_eq!(echoed.as_str(), Some("hi"));

    let envelope = server.next_message().await.expect("envelope not received");
    assert_eq!(
        envelope,
        json!({"jsonrpc": "2.0", "method": "ns1.echo", "params": ["hi"], "id": 0})
    );
    assert_eq!(tunnel.connection_state(), Some(ConnectionState::Connected));

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_calls_share_one_connection() {
    let server = MockServer::builder().start().await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    for _ in 0..3 {
        tunnel.call("ns1.method1", vec![], TypeDescriptor::Any).await.unwrap();
    }
    assert_eq!(server.connections(), 1);

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_calls_before_connect_are_flushed_in_order() {
    let mut server = MockServer::builder()
        .on_socket(|envelope| vec![mock_response(&envelope["id"], envelope["method"].clone())])
        .start()
        .await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    // Issued back to back, before the handshake can have completed
    let first = tunnel.call("ns1.first", vec![], TypeDescriptor::String);
    let second = tunnel.call("ns1.second", vec![], TypeDescriptor::String);
    let third = tunnel.call("ns1.third", vec![], TypeDescriptor::String);

    let (first, second, third) = tokio::join!(first, second, third);
    assert_eq!(first.unwrap().as_str(), Some("ns1.first"));
    assert_eq!(second.unwrap().as_str(), Some("ns1.second"));
    assert_eq!(third.unwrap().as_str(), Some("ns1.third"));

    let mut methods = Vec::new();
    for _ in 0..3 {
        methods.push(server.next_message().await.unwrap()["method"].clone());
    }
    assert_eq!(methods, vec![json!("ns1.first"), json!("ns1.second"), json!("ns1.third")]);

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_out_of_order_replies() {
    // Hold the first call's reply until the second arrives, then answer both
    let server = MockServer::builder()
        .on_socket(|envelope| match envelope["id"].as_u64() {
            Some(0) => vec![],
            Some(1) => vec![
                mock_response(&json!(1), json!("second")),
                mock_response(&json!(0), json!("first")),
            ],
            _ => vec![mock_response(&envelope["id"], json!(null))],
        })
        .start()
        .await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let first = tunnel.call("ns1.slow", vec![], TypeDescriptor::String);
    let second = tunnel.call("ns1.fast", vec![], TypeDescriptor::String);

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap().as_str(), Some("first"));
    assert_eq!(second.unwrap().as_str(), Some("second"));

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_reply_with_unknown_id_is_dropped() {
    let server = MockServer::builder()
        .on_socket(|envelope| {
            vec![
                mock_response(&json!(999), json!("stray")),
                json!({"jsonrpc": "2.0", "result": "no id"}),
                mock_response(&envelope["id"], json!("real")),
            ]
        })
        .start()
        .await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let result = tunnel.call("ns1.method1", vec![], TypeDescriptor::String).await.unwrap();
    assert_eq!(result.as_str(), Some("real"));

    // The connection survives the stray frames
    let again = tunnel.call("ns1.method1", vec![], TypeDescriptor::String).await.unwrap();
    assert_eq!(again.as_str(), Some("real"));
    assert_eq!(tunnel.connection_state(), Some(ConnectionState::Connected));

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_error_reply_is_execution_fault() {
    let server = MockServer::builder()
        .on_socket(|envelope| vec![mock_error_response(&envelope["id"], -32000, "Render failed")])
        .start()
        .await;
    let tunnel = RpcTunnel::new(server.url());

    let error = tunnel
        .call_via("ns1.render", vec![], TypeDescriptor::Any, TransportKind::WebSocket)
        .await
        .unwrap_err();

    assert!(error.is_execution_fault());
    assert_eq!(error.remote().unwrap().message, "Render failed");
    // An execution fault leaves the connection usable
    assert_eq!(tunnel.connection_state(), Some(ConnectionState::Connected));

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_binary_result_over_socket() {
    let server = MockServer::builder()
        .on_socket(|envelope| vec![mock_response(&envelope["id"], json!("SGVsbG8="))])
        .start()
        .await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let bytes = tunnel.call("ns1.getBinary", vec![], TypeDescriptor::Binary).await.unwrap();
    assert_eq!(bytes.as_bytes(), Some(&b"Hello"[..]));

    tunnel.close().await;
    server.shutdown();
}

#[tokio::test]
async fn test_close_rejects_waiting_calls() {
    // Never answers
    let mut server = MockServer::builder().on_socket(|_| vec![]).start().await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let waiting = tunnel.call("ns1.never", vec![], TypeDescriptor::Any);
    server.next_message().await.expect("envelope not received");

    tunnel.close().await;

    assert!(matches!(waiting.await, Err(Error::ConnectionClosed)));
    assert_eq!(tunnel.connection_state(), Some(ConnectionState::Closed));
    assert!(eventually(|| server.close_frames() == 1).await);

    // No reconnection: later socket calls fail at once
    let late = tunnel.call("ns1.method1", vec![], TypeDescriptor::Any).await;
    assert!(matches!(late, Err(Error::ConnectionClosed)));
    assert_eq!(server.connections(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_server_close_rejects_waiting_calls() {
    let mut server = MockServer::builder().on_socket(|_| vec![]).start().await;
    let tunnel = RpcTunnel::new(server.url());
    tunnel.use_web_socket();

    let waiting = tunnel.call("ns1.never", vec![], TypeDescriptor::Any);
    server.next_message().await.expect("envelope not received");

    server.close_sockets();

    assert!(matches!(waiting.await, Err(Error::ConnectionClosed)));
    let mut state = tunnel.watch_connection_state().unwrap();
    state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();

    server.shutdown();
}

#[tokio::test]
async fn test_connection_state_is_observable() {
    let server = MockServer::builder().start().await;
    let tunnel = RpcTunnel::new(server.url());
    assert!(tunnel.watch_connection_state().is_none());

    let call = tunnel.call_via("ns1.method1", vec![], TypeDescriptor::Any, TransportKind::WebSocket);
    let mut state = tunnel.watch_connection_state().expect("socket not created");

    state.wait_for(|s| *s == ConnectionState::Connected).await.unwrap();
    call.await.unwrap();

    tunnel.close().await;
    assert_eq!(*state.borrow(), ConnectionState::Closed);

    server.shutdown();
}

#[tokio::test]
async fn test_http_unaffected_by_socket_close() {
    let server = MockServer::builder().start().await;
    let tunnel = RpcTunnel::new(server.url());

    tunnel
        .call_via("ns1.method1", vec![], TypeDescriptor::Any, TransportKind::WebSocket)
        .await
        .unwrap();
    tunnel.close().await;

    let result = tunnel.call("ns1.method1", vec![], TypeDescriptor::Any).await;
    assert_eq!(result.unwrap(), Value::Null);

    server.shutdown();
}
