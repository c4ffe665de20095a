//! Tunnel metrics
//!
//! OpenTelemetry instruments recorded by a tunnel built with observability
//! enabled:
//!
//! - **rpctunnel.calls.total**: settled calls, by method, transport and status
//! - **rpctunnel.call.duration**: seconds from dispatch to settlement
//! - **rpctunnel.errors.total**: rejected calls and dropped frames, by fault kind
//! - **rpctunnel.events.received**: event pushes, by event name
//! - **rpctunnel.socket.connection.state**: see [`ConnectionState::code`]
//!
//! [`ConnectionState::code`]: crate::ConnectionState::code

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    InstrumentationScope, KeyValue,
};

pub struct TunnelMetrics {
    pub connection_state: Gauge<i64>,
    pub calls_total: Counter<u64>,
    pub call_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub events_received: Counter<u64>,
}

impl TunnelMetrics {
    /// Instruments on the global meter provider, scoped to `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let scope = InstrumentationScope::builder(service_name.into()).build();
        let meter = global::meter_with_scope(scope);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("rpctunnel.socket.connection.state")
                .with_description("Socket state (0=connecting, 1=connected, 2=closed, 3=failed)")
                .build(),
            calls_total: meter
                .u64_counter("rpctunnel.calls.total")
                .with_description("Total number of settled calls")
                .build(),
            call_duration: meter
                .f64_histogram("rpctunnel.call.duration")
                .with_description("Call duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("rpctunnel.errors.total")
                .with_description("Total number of faults")
                .build(),
            events_received: meter
                .u64_counter("rpctunnel.events.received")
                .with_description("Total number of event pushes received")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    pub fn record_call(&self, method: &str, transport: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("transport", transport.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, fault_kind: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("fault_kind", fault_kind.to_string())]);
    }

    pub fn record_event(&self, name: &str) {
        self.events_received
            .add(1, &[KeyValue::new("event", name.to_string())]);
    }
}
