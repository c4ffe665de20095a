//! Transport seam
//!
//! A transport takes an encoded envelope and eventually settles the
//! envelope's [`PendingCall`]. Dispatch is synchronous and never fails: any
//! failure, immediate or not, is delivered by settling the pending call.

use crate::pending::PendingCall;
use rpctunnel_core::{Envelope, Error};
use std::fmt;
use std::str::FromStr;

/// Delivers envelopes to the remote service
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Deliver `envelope` and settle `call` with its reply
    fn send(&self, envelope: Envelope, call: PendingCall);
}

/// The transports a tunnel can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// One POST per call
    #[default]
    Http,
    /// One persistent connection carrying calls and event pushes
    WebSocket,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "HTTP",
            TransportKind::WebSocket => "WebSocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    /// Transport names are matched case-insensitively
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("HTTP") {
            Ok(TransportKind::Http)
        } else if name.eq_ignore_ascii_case("WebSocket") {
            Ok(TransportKind::WebSocket)
        } else {
            Err(Error::UnknownTransport(name.to_string()))
        }
    }
}
