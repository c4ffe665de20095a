//! The tunnel: one endpoint, two transports
//!
//! [`RpcTunnel`] is what generated proxies call. It builds envelopes,
//! assigns ids from one sequence shared by both transports, picks the
//! transport, and returns a [`Call`] future for the converted result.
//!
//! # Transports
//!
//! Calls go over HTTP unless another default is selected or a transport is
//! named per call. The WebSocket connection is opened on first use and
//! shared by every later socket call and by event subscriptions; both
//! transports are created lazily and cached.
//!
//! # Cloning
//!
//! `RpcTunnel` is cheaply cloneable. All clones share the transports, the
//! id sequence and the event handlers.
//!
//! # Runtime
//!
//! Dispatch spawns Tokio tasks, so calls must be made from within a Tokio
//! runtime.

use crate::connection_state::ConnectionState;
use crate::events::{EventHandler, EventRegistry};
use crate::http::HttpTransport;
use crate::pending::{Call, CallContext, PendingCall};
use crate::sequence::IdGenerator;
use crate::socket::SocketTransport;
use crate::transport::{Transport, TransportKind};
use crate::tunnel_builder::TunnelBuilder;
use rpctunnel_core::{argument, Argument, Envelope, TypeDescriptor, TypeRegistry, Value};
use std::future::Future;
use std::sync::{Arc, OnceLock, RwLock};
use tokio::sync::watch;

const SUBSCRIBE_METHOD: &str = "rpc.on";
const UNSUBSCRIBE_METHOD: &str = "rpc.off";

#[derive(Clone)]
pub struct RpcTunnel {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    ids: Arc<dyn IdGenerator>,
    context: CallContext,
    events: EventRegistry,
    default_transport: RwLock<TransportKind>,
    http_client: reqwest::Client,
    http: OnceLock<Arc<HttpTransport>>,
    socket: OnceLock<Arc<SocketTransport>>,
}

impl RpcTunnel {
    /// A tunnel to `url` with default settings
    ///
    /// HTTP is the default transport, the type registry is empty and ids
    /// start at 0. Use [`RpcTunnel::builder`] for anything else.
    pub fn new(url: impl Into<String>) -> Self {
        TunnelBuilder::new(url).assemble(None)
    }

    pub fn builder(url: impl Into<String>) -> TunnelBuilder {
        TunnelBuilder::new(url)
    }

    pub(crate) fn from_parts(
        url: String,
        default_transport: TransportKind,
        ids: Arc<dyn IdGenerator>,
        context: CallContext,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url,
                ids,
                context,
                events: EventRegistry::new(),
                default_transport: RwLock::new(default_transport),
                http_client,
                http: OnceLock::new(),
                socket: OnceLock::new(),
            }),
        }
    }

    /// HTTP endpoint URL
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.context.registry
    }

    pub fn events(&self) -> &EventRegistry {
        &self.inner.events
    }

    /// Call `method` over the default transport
    ///
    /// Never blocks and never fails directly: argument marshalling faults,
    /// transport faults and execution faults all arrive through the
    /// returned future.
    ///
    /// ```rust,no_run
    /// use rpctunnel_client::RpcTunnel;
    /// use rpctunnel_core::{Argument, TypeDescriptor};
    ///
    /// # async fn example() -> rpctunnel_core::Result<()> {
    /// let tunnel = RpcTunnel::new("http://localhost:3000/endpoint/1.0");
    /// let sum = tunnel
    ///     .call("ns1.sum", vec![Argument::value(2), Argument::value(3)], TypeDescriptor::Integer)
    ///     .await?;
    /// assert_eq!(sum.as_i64(), Some(5));
    /// # Ok(())
    /// # }
    /// ```
    pub fn call(&self, method: &str, args: Vec<Argument>, expected: TypeDescriptor) -> Call {
        self.call_via(method, args, expected, self.default_transport())
    }

    /// Call `method` over a named transport, regardless of the default
    #[tracing::instrument(
        skip(self, args, expected, transport),
        fields(transport = %transport, id = tracing::field::Empty)
    )]
    pub fn call_via(
        &self,
        method: &str,
        args: Vec<Argument>,
        expected: TypeDescriptor,
        transport: TransportKind,
    ) -> Call {
        let id = self.inner.ids.next_id();
        tracing::Span::current().record("id", id);

        let (pending, call) =
            PendingCall::new(id, method, transport, expected, self.inner.context.clone());

        let params = match argument::marshal_params(&args) {
            Ok(params) => params,
            Err(e) => {
                pending.reject(e);
                return call;
            }
        };

        tracing::debug!("Dispatching call");
        self.transport(transport)
            .send(Envelope::new(method, params, id), pending);
        call
    }

    /// Subscribe to or unsubscribe from an event
    ///
    /// With a handler, the handler is appended to the event's list and
    /// `rpc.on` is sent over the socket. Without one, `rpc.off` is sent.
    /// The returned call settles with the server's answer to that control
    /// message.
    pub fn event(&self, name: &str, handler: Option<EventHandler>) -> Call {
        match handler {
            Some(handler) => {
                self.inner.events.register(name, handler);
                self.control(SUBSCRIBE_METHOD, name)
            }
            None => self.control(UNSUBSCRIBE_METHOD, name),
        }
    }

    /// Register `handler` for `name`, converting payloads to `expected`
    pub fn on<F, Fut>(&self, name: &str, expected: TypeDescriptor, handler: F) -> Call
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.event(name, Some(EventHandler::new(expected, handler)))
    }

    /// Tell the server to stop sending `name`
    ///
    /// Handlers registered for `name` stay registered, so pushes that still
    /// arrive are delivered, and a later [`RpcTunnel::on`] adds to them.
    pub fn off(&self, name: &str) -> Call {
        self.event(name, None)
    }

    fn control(&self, method: &str, name: &str) -> Call {
        self.call_via(
            method,
            vec![Argument::value(name)],
            TypeDescriptor::Any,
            TransportKind::WebSocket,
        )
    }

    pub fn default_transport(&self) -> TransportKind {
        *self
            .inner
            .default_transport
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Change the transport used by later calls
    pub fn select_transport(&self, kind: TransportKind) {
        *self
            .inner
            .default_transport
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = kind;
        tracing::debug!(transport = %kind, "Default transport selected");
    }

    pub fn use_http(&self) {
        self.select_transport(TransportKind::Http);
    }

    pub fn use_web_socket(&self) {
        self.select_transport(TransportKind::WebSocket);
    }

    /// State of the socket connection, if one was ever opened
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.inner.socket.get().map(|socket| socket.state())
    }

    /// Watch the socket connection state, if one was ever opened
    pub fn watch_connection_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.inner.socket.get().map(|socket| socket.watch_state())
    }

    /// Close the socket connection, if one was ever opened
    ///
    /// Socket calls still waiting are rejected and later socket calls are
    /// rejected immediately. HTTP calls are unaffected.
    pub async fn close(&self) {
        if let Some(socket) = self.inner.socket.get() {
            socket.close().await;
        }
    }

    fn transport(&self, kind: TransportKind) -> Arc<dyn Transport> {
        match kind {
            TransportKind::Http => {
                let http = self.inner.http.get_or_init(|| {
                    Arc::new(HttpTransport::new(
                        self.inner.url.clone(),
                        self.inner.http_client.clone(),
                    ))
                });
                Arc::clone(http) as Arc<dyn Transport>
            }
            TransportKind::WebSocket => {
                let socket = self.inner.socket.get_or_init(|| {
                    Arc::new(SocketTransport::connect(
                        &self.inner.url,
                        self.inner.context.clone(),
                        self.inner.events.clone(),
                    ))
                });
                Arc::clone(socket) as Arc<dyn Transport>
            }
        }
    }
}

impl std::fmt::Debug for RpcTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTunnel")
            .field("url", &self.inner.url)
            .field("default_transport", &self.default_transport())
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpctunnel_core::Error;

    #[test]
    fn test_defaults() {
        let tunnel = RpcTunnel::new("http://localhost:3000/endpoint/1.0");

        assert_eq!(tunnel.url(), "http://localhost:3000/endpoint/1.0");
        assert_eq!(tunnel.default_transport(), TransportKind::Http);
        assert!(tunnel.registry().is_empty());
        assert_eq!(tunnel.connection_state(), None);
    }

    #[test]
    fn test_select_transport() {
        let tunnel = RpcTunnel::new("http://localhost:3000/endpoint/1.0");
        let clone = tunnel.clone();

        tunnel.use_web_socket();
        assert_eq!(clone.default_transport(), TransportKind::WebSocket);

        clone.use_http();
        assert_eq!(tunnel.default_transport(), TransportKind::Http);
    }

    #[tokio::test]
    async fn test_unmarshallable_argument_rejects_future() {
        let tunnel = RpcTunnel::new("http://127.0.0.1:9/endpoint");

        let call = tunnel.call("ns1.method1", vec![Argument::value(f64::NAN)], TypeDescriptor::Any);

        assert!(matches!(call.await, Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_http_calls_do_not_open_socket() {
        let tunnel = RpcTunnel::new("http://127.0.0.1:9/endpoint");

        let result = tunnel.call("ns1.method1", vec![], TypeDescriptor::Any).await;

        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(tunnel.connection_state(), None);
        tunnel.close().await;
    }

    #[tokio::test]
    async fn test_subscribe_registers_handler_locally() {
        let tunnel = RpcTunnel::new("http://127.0.0.1:9/endpoint");

        let call = tunnel.on("testEvent", TypeDescriptor::Mapping, |_| async {});
        assert_eq!(tunnel.events().handler_count("testEvent"), 1);

        // Nothing listens on port 9
        assert!(matches!(call.await, Err(Error::WebSocket(_))));

        tunnel.off("testEvent").await.unwrap_err();
        assert_eq!(tunnel.events().handler_count("testEvent"), 1);
    }
}
