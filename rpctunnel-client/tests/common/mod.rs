//! Common test utilities
//!
//! [`MockServer`] stands in for a json-ws service: one address answering
//! both HTTP POSTs and WebSocket upgrades, the way the real endpoint does.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use warp::http::{Response, StatusCode};
use warp::ws::{Message, WebSocket};
use warp::Filter;

const WAIT: Duration = Duration::from_secs(5);

/// What the mock answers to one POST
pub enum HttpReply {
    /// `application/json` body
    Json(Value),
    /// `application/octet-stream` body
    Binary(Vec<u8>),
    /// Any status, content type and body
    Raw {
        status: u16,
        content_type: &'static str,
        body: String,
    },
}

impl HttpReply {
    fn into_response(self) -> Response<Vec<u8>> {
        let (status, content_type, body) = match self {
            HttpReply::Json(value) => (200, "application/json", value.to_string().into_bytes()),
            HttpReply::Binary(bytes) => (200, "application/octet-stream", bytes),
            HttpReply::Raw {
                status,
                content_type,
                body,
            } => (status, content_type, body.into_bytes()),
        };

        Response::builder()
            .status(StatusCode::from_u16(status).unwrap())
            .header("content-type", content_type)
            .body(body)
            .unwrap()
    }
}

/// One POST as the server saw it
#[derive(Debug)]
pub struct RecordedPost {
    pub content_type: Option<String>,
    pub envelope: Value,
}

type HttpHandler = Box<dyn Fn(&Value) -> HttpReply + Send + Sync>;
type SocketHandler = Box<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

enum Outbound {
    Frame(String),
    Close,
}

struct Shared {
    http_handler: HttpHandler,
    socket_handler: SocketHandler,
    posts: mpsc::UnboundedSender<RecordedPost>,
    messages: mpsc::UnboundedSender<Value>,
    peers: Mutex<Vec<mpsc::UnboundedSender<Outbound>>>,
    connections: AtomicUsize,
    close_frames: AtomicUsize,
}

pub struct MockServerBuilder {
    http_handler: HttpHandler,
    socket_handler: SocketHandler,
}

impl MockServerBuilder {
    /// Answer POSTs with `handler`
    pub fn on_http<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> HttpReply + Send + Sync + 'static,
    {
        self.http_handler = Box::new(handler);
        self
    }

    /// Answer each socket envelope with the frames `handler` returns
    pub fn on_socket<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        self.socket_handler = Box::new(handler);
        self
    }

    pub async fn start(self) -> MockServer {
        let (posts_tx, posts_rx) = mpsc::unbounded_channel();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            http_handler: self.http_handler,
            socket_handler: self.socket_handler,
            posts: posts_tx,
            messages: messages_tx,
            peers: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            close_frames: AtomicUsize::new(0),
        });

        let with_shared = {
            let shared = Arc::clone(&shared);
            warp::any().map(move || Arc::clone(&shared))
        };

        let socket_route = warp::ws()
            .and(with_shared.clone())
            .map(|ws: warp::ws::Ws, shared: Arc<Shared>| {
                ws.on_upgrade(move |socket| serve_socket(socket, shared))
            });

        let http_route = warp::post()
            .and(warp::header::optional::<String>("content-type"))
            .and(warp::body::bytes())
            .and(with_shared)
            .map(
                |content_type: Option<String>, body: warp::hyper::body::Bytes, shared: Arc<Shared>| {
                    let envelope: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let reply = (shared.http_handler)(&envelope);
                    let _ = shared.posts.send(RecordedPost {
                        content_type,
                        envelope,
                    });
                    reply.into_response()
                },
            );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(socket_route.or(http_route))
            .bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async move {
                let _ = shutdown_rx.await;
            });
        tokio::spawn(server);

        MockServer {
            addr,
            shared,
            posts: posts_rx,
            messages: messages_rx,
            shutdown: Some(shutdown_tx),
        }
    }
}

async fn serve_socket(socket: WebSocket, shared: Arc<Shared>) {
    shared.connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    shared.peers.lock().unwrap().push(tx.clone());

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Frame(text)) => {
                    if write.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::close()).await;
                    break;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(msg)) if msg.is_text() => {
                    let text = msg.to_str().unwrap_or_default();
                    let envelope: Value = serde_json::from_str(text).unwrap_or(Value::Null);
                    let _ = shared.messages.send(envelope.clone());
                    for frame in (shared.socket_handler)(&envelope) {
                        let _ = tx.send(Outbound::Frame(frame.to_string()));
                    }
                }
                Some(Ok(msg)) if msg.is_close() => {
                    shared.close_frames.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

/// Mock json-ws service for integration tests
pub struct MockServer {
    addr: std::net::SocketAddr,
    shared: Arc<Shared>,
    posts: mpsc::UnboundedReceiver<RecordedPost>,
    messages: mpsc::UnboundedReceiver<Value>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Defaults answer every call with a `null` result
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder {
            http_handler: Box::new(|envelope: &Value| HttpReply::Json(mock_response(&envelope["id"], Value::Null))),
            socket_handler: Box::new(|envelope: &Value| vec![mock_response(&envelope["id"], Value::Null)]),
        }
    }

    /// HTTP endpoint URL; the tunnel derives the socket URL from it
    pub fn url(&self) -> String {
        format!("http://{}/endpoint/1.0", self.addr)
    }

    /// Next POST the server received
    pub async fn next_post(&mut self) -> Option<RecordedPost> {
        tokio::time::timeout(WAIT, self.posts.recv()).await.ok().flatten()
    }

    /// Next envelope received over any socket
    pub async fn next_message(&mut self) -> Option<Value> {
        tokio::time::timeout(WAIT, self.messages.recv()).await.ok().flatten()
    }

    /// Push a frame to every connected socket
    pub fn push(&self, frame: Value) {
        for peer in self.shared.peers.lock().unwrap().iter() {
            let _ = peer.send(Outbound::Frame(frame.to_string()));
        }
    }

    /// Close every connected socket from the server side
    pub fn close_sockets(&self) {
        for peer in self.shared.peers.lock().unwrap().iter() {
            let _ = peer.send(Outbound::Close);
        }
    }

    /// Socket connections accepted so far
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Close frames received from clients
    pub fn close_frames(&self) -> usize {
        self.shared.close_frames.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Create a mock success response
pub fn mock_response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

/// Create a mock error response
pub fn mock_error_response(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message,
        },
        "id": id,
    })
}

/// Create a mock event push
pub fn mock_event(name: &str, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": data,
        "id": name,
    })
}

/// Poll `condition` until it holds or the wait runs out
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
