//! WebSocket transport
//!
//! One persistent connection per tunnel, opened by a background task as
//! soon as the transport is created. Callers never wait for the handshake:
//! encoded envelopes go onto an unbounded queue that the task drains only
//! once connected, so envelopes sent early are flushed in send order.
//!
//! Every inbound text frame is decoded as a reply and routed by its `id`:
//!
//! - a number settles the pending call with that id (unknown ids are
//!   dropped quietly);
//! - a string is an event name, and the payload goes to that event's
//!   handlers;
//! - anything else is dropped.
//!
//! Event handlers run on a separate dispatch task, one push at a time and
//! in registration order, so a handler may itself await socket calls while
//! the connection task keeps reading replies.
//!
//! There is no reconnection. When the connection fails or closes, every
//! call still waiting is rejected and later calls are rejected immediately.

use crate::connection_state::{ConnectionState, ConnectionTracker};
use crate::events::EventRegistry;
use crate::metrics::TunnelMetrics;
use crate::pending::{CallContext, PendingCall, PendingCalls};
use crate::transport::{Transport, TransportKind};
use futures::{SinkExt, StreamExt};
use rpctunnel_core::{codec, Envelope, Error, Frame, TypeRegistry, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Socket endpoint for an HTTP endpoint
///
/// Every occurrence of `http` becomes `ws`, which maps `http://` to `ws://`
/// and `https://` to `wss://` but also rewrites `http` anywhere in the host
/// or path.
///
/// ```rust
/// use rpctunnel_client::socket_url;
///
/// assert_eq!(socket_url("http://localhost:3000/endpoint/1.0"), "ws://localhost:3000/endpoint/1.0");
/// assert_eq!(socket_url("https://example.com/rpc"), "wss://example.com/rpc");
/// ```
pub fn socket_url(http_url: &str) -> String {
    http_url.replace("http", "ws")
}

enum Command {
    Send(String),
    Close,
}

/// One event push waiting for its handlers
struct Push {
    name: String,
    data: serde_json::Value,
}

pub struct SocketTransport {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    pending: PendingCalls,
    state: Arc<ConnectionTracker>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketTransport {
    /// Start connecting to the socket endpoint derived from `http_url`
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn connect(http_url: &str, context: CallContext, events: EventRegistry) -> Self {
        let url = socket_url(http_url);
        let (commands, queue) = mpsc::unbounded_channel();
        let pending = PendingCalls::new();
        let state = Arc::new(ConnectionTracker::new());
        let (pushes, inbox) = mpsc::unbounded_channel();

        tokio::spawn(dispatch_events(events, Arc::clone(&context.registry), inbox));

        let connection = Connection {
            url: url.clone(),
            pending: pending.clone(),
            pushes,
            state: Arc::clone(&state),
            context,
        };
        let task = tokio::spawn(connection.run(queue));

        Self {
            url,
            commands,
            pending,
            state,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// Watch connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Send a close frame and wait for the connection task to finish
    ///
    /// Calls still waiting are rejected with [`Error::ConnectionClosed`].
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close);

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Socket task ended abnormally");
            }
        }
        // Covers a task that was torn down without closing the table
        self.pending.close(Error::ConnectionClosed);
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn send(&self, envelope: Envelope, call: PendingCall) {
        let id = envelope.id;
        let text = match codec::encode_envelope(&envelope) {
            Ok(text) => text,
            Err(e) => return call.reject(e),
        };

        // Registered before queueing so the reply cannot overtake it
        if let Err((call, reason)) = self.pending.register(call) {
            return call.reject(reason);
        }

        if self.commands.send(Command::Send(text)).is_err() {
            if let Some(call) = self.pending.take(id) {
                call.reject(Error::ConnectionClosed);
            }
        }
    }
}

/// State owned by the connection task
struct Connection {
    url: String,
    pending: PendingCalls,
    pushes: mpsc::UnboundedSender<Push>,
    state: Arc<ConnectionTracker>,
    context: CallContext,
}

impl Connection {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<Command>) {
        self.report_state(ConnectionState::Connecting);
        tracing::info!(url = %self.url, "Connecting to server");

        let ws_stream = match connect_async(self.url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Connection failed");
                self.finish(ConnectionState::Failed, Error::WebSocket(e.to_string()));
                return;
            }
        };

        self.report_state(ConnectionState::Connected);
        tracing::info!(url = %self.url, "Connected successfully");

        let (mut sink, mut stream) = ws_stream.split();

        let (end_state, reason) = loop {
            tokio::select! {
                command = queue.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::error!(error = %e, "WebSocket send failed");
                            break (ConnectionState::Failed, Error::WebSocket(e.to_string()));
                        }
                    }
                    Some(Command::Close) | None => {
                        tracing::info!(url = %self.url, "Closing connection");
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            tracing::debug!(error = %e, "Close frame not sent");
                        }
                        break (ConnectionState::Closed, Error::ConnectionClosed);
                    }
                },
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => self.route(&text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.route(&text),
                        Err(_) => tracing::warn!("Dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(url = %self.url, "Connection closed by server");
                        break (ConnectionState::Closed, Error::ConnectionClosed);
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket error");
                        break (ConnectionState::Failed, Error::WebSocket(e.to_string()));
                    }
                    Some(Ok(_)) => {}
                },
            }
        };

        self.finish(end_state, reason);
    }

    fn finish(&self, end_state: ConnectionState, reason: Error) {
        self.report_state(end_state);
        if let Some(ref m) = self.context.metrics {
            if end_state == ConnectionState::Failed {
                m.record_error(reason.kind().as_str());
            }
        }
        self.pending.close(reason);
    }

    fn report_state(&self, next: ConnectionState) {
        if self.state.advance(next) {
            tracing::debug!(state = ?next, "Connection state changed");
            record_state(&self.context.metrics, next);
        }
    }

    fn route(&self, text: &str) {
        let reply = match codec::decode_reply(text) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                if let Some(ref m) = self.context.metrics {
                    m.record_error(e.kind().as_str());
                }
                return;
            }
        };

        match reply.into_frame() {
            Frame::Response { id, outcome } => match self.pending.take(id) {
                Some(call) => {
                    tracing::debug!(id, "Response received");
                    call.settle(outcome.map(Value::from_json).map_err(Error::Execution));
                }
                None => tracing::debug!(id, "Dropping response for unknown call id"),
            },
            Frame::Event { name, data } => {
                tracing::debug!(event = %name, "Event received");
                if let Some(ref m) = self.context.metrics {
                    m.record_event(&name);
                }
                if self.pushes.send(Push { name, data }).is_err() {
                    tracing::warn!("Event dispatcher gone, dropping event");
                }
            }
            Frame::Unaddressed => tracing::warn!("Dropping reply without id"),
        }
    }
}

/// Run handlers for each push in arrival order
///
/// Ends once the connection task has finished and every queued push has
/// been handled.
async fn dispatch_events(
    events: EventRegistry,
    registry: Arc<TypeRegistry>,
    mut inbox: mpsc::UnboundedReceiver<Push>,
) {
    while let Some(push) = inbox.recv().await {
        events.dispatch(&registry, &push.name, push.data).await;
    }
    tracing::debug!("Event dispatcher stopped");
}

fn record_state(metrics: &Option<Arc<TunnelMetrics>>, state: ConnectionState) {
    if let Some(m) = metrics {
        m.update_connection_state(state.code());
    }
}
