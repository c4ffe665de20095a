//! Tunnel builder
//!
//! Everything about a tunnel that is fixed at construction time: the
//! default transport, the type registry results are converted against, the
//! id sequence, the HTTP client, and observability.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rpctunnel_client::{TransportKind, TunnelBuilder};
//! use rpctunnel_core::{EnumType, TypeRegistry};
//! use std::sync::Arc;
//!
//! # fn example() -> rpctunnel_core::Result<()> {
//! let mut registry = TypeRegistry::new();
//! registry.register_enum(EnumType::new("RenderMode").variant("Production", -1));
//! registry.validate()?;
//!
//! let tunnel = TunnelBuilder::new("http://localhost:3000/endpoint/1.0")
//!     .default_transport(TransportKind::WebSocket)
//!     .registry(Arc::new(registry))
//!     .with_default_observability()
//!     .service_name("render-farm-client")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::metrics::TunnelMetrics;
use crate::pending::CallContext;
use crate::sequence::{AtomicIdGenerator, IdGenerator};
use crate::transport::TransportKind;
use crate::RpcTunnel;
use rpctunnel_core::{Error, ObservabilityConfig, Result, TypeRegistry};
use std::sync::Arc;

pub struct TunnelBuilder {
    url: String,
    default_transport: TransportKind,
    registry: Arc<TypeRegistry>,
    id_generator: Arc<dyn IdGenerator>,
    http_client: Option<reqwest::Client>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl TunnelBuilder {
    /// Start from the defaults for the HTTP endpoint `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_transport: TransportKind::Http,
            registry: Arc::new(TypeRegistry::new()),
            id_generator: Arc::new(AtomicIdGenerator::new()),
            http_client: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Transport used by calls that do not name one
    pub fn default_transport(mut self, kind: TransportKind) -> Self {
        self.default_transport = kind;
        self
    }

    /// Types that results and event payloads are converted against
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Source of call ids, shared by both transports
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = ids;
        self
    }

    /// Client used for HTTP calls, e.g. one with a timeout or proxy set
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Initialize OpenTelemetry with `config` and record tunnel metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Overrides the service name of the observability config
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the tunnel
    ///
    /// No connection is made here. Fails only if observability was
    /// requested and cannot be initialized.
    pub fn build(mut self) -> Result<RpcTunnel> {
        let metrics = match self.observability_config.take() {
            Some(mut config) => {
                if let Some(name) = self.service_name.take() {
                    config.service_name = name;
                }

                rpctunnel_core::init_observability(config.clone()).map_err(|e| {
                    Error::Configuration(format!("Failed to initialize observability: {}", e))
                })?;

                Some(Arc::new(TunnelMetrics::new(config.service_name)))
            }
            None => None,
        };

        Ok(self.assemble(metrics))
    }

    pub(crate) fn assemble(self, metrics: Option<Arc<TunnelMetrics>>) -> RpcTunnel {
        let context = CallContext {
            registry: self.registry,
            metrics,
        };

        tracing::debug!(url = %self.url, transport = %self.default_transport, "Tunnel created");

        RpcTunnel::from_parts(
            self.url,
            self.default_transport,
            self.id_generator,
            context,
            self.http_client.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpctunnel_core::StructType;

    #[test]
    fn test_builder_defaults() {
        let builder = TunnelBuilder::new("http://localhost:3000/endpoint/1.0");
        assert_eq!(builder.url, "http://localhost:3000/endpoint/1.0");
        assert_eq!(builder.default_transport, TransportKind::Http);
        assert!(builder.registry.is_empty());
        assert!(builder.observability_config.is_none());
    }

    #[test]
    fn test_builder_settings_reach_tunnel() {
        let mut registry = TypeRegistry::new();
        registry.register_struct(StructType::new("RenderOptions"));

        let tunnel = TunnelBuilder::new("http://localhost:3000/endpoint/1.0")
            .default_transport(TransportKind::WebSocket)
            .registry(Arc::new(registry))
            .id_generator(Arc::new(AtomicIdGenerator::starting_at(10)))
            .http_client(reqwest::Client::new())
            .build()
            .unwrap();

        assert_eq!(tunnel.default_transport(), TransportKind::WebSocket);
        assert!(tunnel.registry().get_struct("RenderOptions").is_some());
    }

    #[test]
    fn test_service_name_applies_to_observability() {
        let builder = TunnelBuilder::new("http://localhost:3000")
            .with_default_observability()
            .service_name("render-farm-client");

        assert_eq!(builder.service_name.as_deref(), Some("render-farm-client"));
        assert!(builder.observability_config.is_some());
    }
}
