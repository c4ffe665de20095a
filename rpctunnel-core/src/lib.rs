//! Core types for rpctunnel
//!
//! Everything here is transport-agnostic and performs no I/O:
//!
//! - **Types**: the request envelope, the reply, and the frame a reply
//!   routes to (call response or event push)
//! - **Codec**: JSON encoding and decoding mapped onto the fault categories
//! - **Error handling**: execution faults versus transport faults
//! - **Type marshalling**: type descriptors, the type registry, the dynamic
//!   [`Value`] model, and construct / serialize / convert
//! - **Arguments**: positional arguments with optional-argument markers
//! - **Observability**: OpenTelemetry bootstrap
//!
//! The `rpctunnel-client` crate builds the HTTP and WebSocket transports and
//! the tunnel itself on top of this.
//!
//! # Example
//!
//! ```rust
//! use rpctunnel_core::{marshal, EnumType, StructType, TypeDescriptor, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! let options = registry.register_struct(
//!     StructType::new("RenderOptions")
//!         .field("width", TypeDescriptor::Integer)
//!         .field("renderMode", TypeDescriptor::named("RenderMode")),
//! );
//! registry.register_enum(EnumType::new("RenderMode").variant("Production", -1));
//!
//! let raw = Value::from_json(serde_json::json!({"width": 640, "renderMode": "Production"}));
//! let value = marshal::construct(&registry, &options, raw).unwrap();
//! assert_eq!(value.get("renderMode").and_then(Value::as_i64), Some(-1));
//! ```

pub mod argument;
pub mod codec;
pub mod error;
pub mod marshal;
pub mod observability;
pub mod schema;
pub mod types;
pub mod value;

pub use argument::{Argument, Optional};
pub use error::{Error, FaultKind, RemoteError, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use schema::{EnumType, FieldDef, StructType, TypeDef, TypeDescriptor, TypeRegistry};
pub use types::{Envelope, Frame, Id, Reply, JSONRPC_VERSION};
pub use value::{EnumValue, StructValue, Value};
