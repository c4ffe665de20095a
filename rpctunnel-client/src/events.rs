//! Event subscriptions
//!
//! The service pushes events over the persistent connection as replies whose
//! `id` member is the event name. Each event name maps to an ordered list of
//! handlers, each with the type its payload is converted to before the
//! handler runs.
//!
//! Registering a handler never replaces an earlier one for the same event.
//! Unsubscribing from the server (`rpc.off`) leaves local handlers in place;
//! see [`crate::RpcTunnel::off`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use rpctunnel_client::RpcTunnel;
//! use rpctunnel_core::TypeDescriptor;
//!
//! # async fn example(tunnel: &RpcTunnel) -> rpctunnel_core::Result<()> {
//! tunnel
//!     .on("renderProgress", TypeDescriptor::Float, |progress| async move {
//!         println!("{:?}", progress.as_f64());
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use rpctunnel_core::{marshal, TypeDescriptor, TypeRegistry, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Type-erased async event handler
pub type EventFn = Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A handler together with the type of payload it expects
#[derive(Clone)]
pub struct EventHandler {
    expected: TypeDescriptor,
    handler: EventFn,
}

impl EventHandler {
    pub fn new<F, Fut>(expected: TypeDescriptor, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            expected,
            handler: Arc::new(move |value| Box::pin(handler(value))),
        }
    }

    pub fn expected(&self) -> &TypeDescriptor {
        &self.expected
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// Event name → handlers, in registration order
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `name`
    pub fn register(&self, name: impl Into<String>, handler: EventHandler) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.entry(name.into()).or_default().push(handler);
        }
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.get(name).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Names with at least one handler
    pub fn events(&self) -> Vec<String> {
        self.handlers
            .lock()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Run every handler registered for `name` with `data`
    ///
    /// Handlers run one after another, in registration order. A payload that
    /// does not convert to a handler's expected type skips that handler.
    /// Returns how many handlers ran.
    pub async fn dispatch(&self, registry: &TypeRegistry, name: &str, data: serde_json::Value) -> usize {
        let subscribed = match self.handlers.lock() {
            Ok(handlers) => handlers.get(name).cloned().unwrap_or_default(),
            Err(_) => return 0,
        };
        // Lock released before any handler runs

        if subscribed.is_empty() {
            tracing::debug!(event = %name, "No handler registered for event");
            return 0;
        }

        let raw = Value::from_json(data);
        let mut delivered = 0;
        for subscription in subscribed {
            match marshal::convert(registry, raw.clone(), &subscription.expected) {
                Ok(value) => {
                    (subscription.handler)(value).await;
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        event = %name,
                        expected = %subscription.expected,
                        error = %e,
                        "Event payload does not fit handler type, skipping handler"
                    );
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex as AsyncMutex;

    fn recording(log: &Arc<AsyncMutex<Vec<String>>>, tag: &'static str) -> EventHandler {
        let log = Arc::clone(log);
        EventHandler::new(TypeDescriptor::Any, move |value| {
            let log = Arc::clone(&log);
            async move {
                log.lock().await.push(format!("{}:{:?}", tag, value.as_i64()));
            }
        })
    }

    #[tokio::test]
    async fn test_dispatch_in_registration_order() {
        let events = EventRegistry::new();
        let log = Arc::new(AsyncMutex::new(Vec::new()));

        events.register("tick", recording(&log, "first"));
        events.register("tick", recording(&log, "second"));
        assert_eq!(events.handler_count("tick"), 2);

        let delivered = events.dispatch(&TypeRegistry::new(), "tick", json!(3)).await;

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().await, vec!["first:Some(3)", "second:Some(3)"]);
    }

    #[tokio::test]
    async fn test_dispatch_only_to_matching_name() {
        let events = EventRegistry::new();
        let log = Arc::new(AsyncMutex::new(Vec::new()));

        events.register("tick", recording(&log, "tick"));
        events.register("tock", recording(&log, "tock"));

        events.dispatch(&TypeRegistry::new(), "tock", json!(1)).await;
        assert_eq!(*log.lock().await, vec!["tock:Some(1)"]);

        assert_eq!(events.dispatch(&TypeRegistry::new(), "unknown", json!(1)).await, 0);
    }

    #[tokio::test]
    async fn test_conversion_failure_skips_handler() {
        let events = EventRegistry::new();
        let log = Arc::new(AsyncMutex::new(Vec::new()));

        let strict_log = Arc::clone(&log);
        events.register(
            "tick",
            EventHandler::new(TypeDescriptor::Mapping, move |_| {
                let log = Arc::clone(&strict_log);
                async move {
                    log.lock().await.push("mapping".to_string());
                }
            }),
        );
        events.register("tick", recording(&log, "any"));

        let delivered = events.dispatch(&TypeRegistry::new(), "tick", json!(5)).await;

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().await, vec!["any:Some(5)"]);
    }

    #[tokio::test]
    async fn test_payload_converted_to_expected_type() {
        let events = EventRegistry::new();
        let received = Arc::new(AsyncMutex::new(None));

        let slot = Arc::clone(&received);
        events.register(
            "testEvent",
            EventHandler::new(TypeDescriptor::Mapping, move |value| {
                let slot = Arc::clone(&slot);
                async move {
                    *slot.lock().await = Some(value);
                }
            }),
        );

        events.dispatch(&TypeRegistry::new(), "testEvent", json!({"a": 1})).await;

        let value = received.lock().await.clone().unwrap();
        assert_eq!(value.get("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_events_lists_names() {
        let events = EventRegistry::new();
        events.register("a", EventHandler::new(TypeDescriptor::Any, |_| async {}));
        events.register("b", EventHandler::new(TypeDescriptor::Any, |_| async {}));

        let mut names = events.events();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
