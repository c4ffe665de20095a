//! RpcTunnel - JSON-RPC over HTTP and WebSocket
//!
//! This is the convenience crate that re-exports the RpcTunnel sub-crates.
//! Use it when a single dependency is wanted for generated service proxies.
//!
//! # Architecture
//!
//! RpcTunnel is organized into modular crates:
//!
//! - **rpctunnel-core**: wire types, codec, type descriptors, value
//!   marshalling, errors, observability
//! - **rpctunnel-client**: the tunnel itself, with its HTTP and WebSocket
//!   transports and event subscriptions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rpctunnel::{Argument, RpcTunnel, TypeDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tunnel = RpcTunnel::new("http://localhost:3000/endpoint/1.0");
//!
//!     let sum = tunnel
//!         .call("ns1.sum", vec![Argument::value(5), Argument::value(3)], TypeDescriptor::Integer)
//!         .await?;
//!     println!("Result: {:?}", sum);
//!
//!     Ok(())
//! }
//! ```

pub use rpctunnel_client as client;
pub use rpctunnel_core as core;

// Convenience re-exports of the types generated proxies touch
pub use rpctunnel_client::{Call, ConnectionState, RpcTunnel, TransportKind, TunnelBuilder};
pub use rpctunnel_core::{
    Argument, EnumType, Error, Result, StructType, StructValue, TypeDescriptor, TypeRegistry, Value,
};
