//! Dual-transport JSON-RPC client
//!
//! An [`RpcTunnel`] talks to one json-ws service endpoint over two
//! transports:
//!
//! - **HTTP**: one POST per call; the default
//! - **WebSocket**: one persistent connection, opened on first use, that
//!   also carries server-pushed events
//!
//! Both draw call ids from the same sequence, so ids never collide across
//! transports. Results are converted to the type the caller declares, using
//! the tunnel's [`TypeRegistry`](rpctunnel_core::TypeRegistry) for
//! structured and enumeration types.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpctunnel_client::RpcTunnel;
//! use rpctunnel_core::{Argument, TypeDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tunnel = RpcTunnel::new("http://localhost:3000/endpoint/1.0");
//!
//!     // Over HTTP
//!     let sum = tunnel
//!         .call("ns1.sum", vec![Argument::value(2), Argument::value(3)], TypeDescriptor::Integer)
//!         .await?;
//!     println!("sum: {:?}", sum.as_i64());
//!
//!     // Events arrive over the socket
//!     tunnel
//!         .on("testEvent", TypeDescriptor::Mapping, |data| async move {
//!             println!("event: {:?}", data);
//!         })
//!         .await?;
//!
//!     // Switch later calls to the socket
//!     tunnel.use_web_socket();
//!     let echoed = tunnel
//!         .call("ns1.echo", vec![Argument::value("hi")], TypeDescriptor::String)
//!         .await?;
//!     println!("echo: {:?}", echoed.as_str());
//!
//!     tunnel.close().await;
//!     Ok(())
//! }
//! ```

mod connection_state;
mod events;
mod http;
mod metrics;
mod pending;
mod sequence;
mod socket;
mod transport;
mod tunnel;
mod tunnel_builder;

pub use connection_state::{ConnectionState, ConnectionTracker};
pub use events::{EventFn, EventHandler, EventRegistry};
pub use http::HttpTransport;
pub use metrics::TunnelMetrics;
pub use pending::{Call, PendingCall};
pub use sequence::{AtomicIdGenerator, IdGenerator};
pub use socket::{socket_url, SocketTransport};
pub use transport::{Transport, TransportKind};
pub use tunnel::RpcTunnel;
pub use tunnel_builder::TunnelBuilder;
