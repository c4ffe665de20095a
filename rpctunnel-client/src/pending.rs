//! Pending call tracking
//!
//! Each dispatched envelope is paired with a [`PendingCall`], the sending
//! half of a oneshot channel whose receiving half is the caller's [`Call`]
//! future. Settling a pending call consumes it, so a call is resolved or
//! rejected at most once.
//!
//! The socket transport keeps its in-flight calls in [`PendingCalls`], keyed
//! by envelope id, until the matching response arrives or the connection
//! goes away. The HTTP transport holds each pending call in the task
//! performing its request.

use crate::metrics::TunnelMetrics;
use crate::transport::TransportKind;
use rpctunnel_core::{marshal, Error, Result, TypeDescriptor, TypeRegistry, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;

/// Future of a call's converted result
///
/// Resolves with the result converted to the declared type, or rejects with
/// an execution or transport fault.
#[must_use = "a call does nothing observable unless awaited"]
#[derive(Debug)]
pub struct Call {
    rx: oneshot::Receiver<Result<Value>>,
}

impl Future for Call {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender only disappears unsettled if its task was torn down
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::ConnectionClosed)))
    }
}

/// Shared by every call of one tunnel
#[derive(Clone, Default)]
pub(crate) struct CallContext {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) metrics: Option<Arc<TunnelMetrics>>,
}

/// The settling side of one dispatched call
pub struct PendingCall {
    id: u64,
    method: String,
    transport: TransportKind,
    expected: TypeDescriptor,
    started: Instant,
    context: CallContext,
    tx: oneshot::Sender<Result<Value>>,
}

impl PendingCall {
    pub(crate) fn new(
        id: u64,
        method: impl Into<String>,
        transport: TransportKind,
        expected: TypeDescriptor,
        context: CallContext,
    ) -> (Self, Call) {
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            id,
            method: method.into(),
            transport,
            expected,
            started: Instant::now(),
            context,
            tx,
        };
        (pending, Call { rx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn expected(&self) -> &TypeDescriptor {
        &self.expected
    }

    /// Settle with a raw outcome
    ///
    /// A raw result is converted to the declared type first; a conversion
    /// failure rejects the call.
    pub fn settle(self, outcome: Result<Value>) {
        let converted = outcome
            .and_then(|raw| marshal::convert(&self.context.registry, raw, &self.expected));
        self.finish(converted);
    }

    /// Reject without a reply
    pub fn reject(self, error: Error) {
        self.finish(Err(error));
    }

    fn finish(self, result: Result<Value>) {
        let duration = self.started.elapsed().as_secs_f64();
        let status = match &result {
            Ok(_) => "success",
            Err(e) => {
                if e.is_execution_fault() {
                    tracing::debug!(id = self.id, method = %self.method, error = %e, "Call failed remotely");
                } else {
                    tracing::warn!(id = self.id, method = %self.method, error = %e, "Call failed");
                }
                "error"
            }
        };

        if let Some(ref m) = self.context.metrics {
            m.record_call(&self.method, &self.transport.to_string(), status, duration);
            if let Err(e) = &result {
                m.record_error(e.kind().as_str());
            }
        }

        tracing::debug!(id = self.id, method = %self.method, status, duration_secs = duration, "Call settled");

        // The caller may have dropped its Call
        let _ = self.tx.send(result);
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("transport", &self.transport)
            .field("expected", &self.expected)
            .finish()
    }
}

/// In-flight calls of one persistent connection
///
/// Once [`PendingCalls::close`] has run, the table stays closed: every call
/// still waiting is rejected, and later registrations are refused.
#[derive(Clone, Default)]
pub(crate) struct PendingCalls {
    inner: Arc<Mutex<Table>>,
}

#[derive(Default)]
struct Table {
    calls: HashMap<u64, PendingCall>,
    closed: Option<Error>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Track a call until its response arrives
    ///
    /// Hands the call back, with the reason, if the connection is already
    /// gone.
    pub(crate) fn register(&self, call: PendingCall) -> std::result::Result<(), (PendingCall, Error)> {
        let mut table = match self.inner.lock() {
            Ok(table) => table,
            Err(_) => return Err((call, Error::ConnectionClosed)),
        };
        if let Some(reason) = &table.closed {
            return Err((call, reason.clone()));
        }
        table.calls.insert(call.id(), call);
        Ok(())
    }

    /// Remove and return the call with this id
    pub(crate) fn take(&self, id: u64) -> Option<PendingCall> {
        self.inner.lock().ok()?.calls.remove(&id)
    }

    /// Reject every waiting call with `reason` and refuse new ones
    pub(crate) fn close(&self, reason: Error) {
        let drained: Vec<PendingCall> = match self.inner.lock() {
            Ok(mut table) => {
                if table.closed.is_none() {
                    table.closed = Some(reason.clone());
                }
                table.calls.drain().map(|(_, call)| call).collect()
            }
            Err(_) => return,
        };

        // Settle outside the lock
        for call in drained {
            call.reject(reason.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|table| table.calls.len()).unwrap_or(0)
    }
}
