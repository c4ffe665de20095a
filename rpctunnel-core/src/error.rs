//! Error types for rpctunnel
//!
//! Every failure a tunnel call can produce is an [`Error`]. The variants fall
//! into two categories, reported by [`Error::kind`]:
//!
//! - **Execution faults**: the remote service signalled an error, either as a
//!   JSON-RPC `error` object or (over HTTP) as a status 500 response.
//! - **Transport faults**: everything local or below the RPC layer, such as
//!   network failures, malformed bodies, unexpected HTTP statuses, and values
//!   that cannot be marshalled to or from the declared type.
//!
//! Callers never see these errors thrown out of `call`; they arrive through
//! the call's future.
//!
//! # Examples
//!
//! ```rust
//! use rpctunnel_core::{Error, FaultKind, RemoteError};
//!
//! let fault = Error::Execution(RemoteError::new("division by zero"));
//! assert_eq!(fault.kind(), FaultKind::Execution);
//!
//! let network = Error::Http("connection refused".into());
//! assert!(!network.is_execution_fault());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rpctunnel operations
pub type Result<T> = std::result::Result<T, Error>;

/// The two fault categories a call can be rejected with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The remote service reported the failure
    Execution,
    /// The failure happened in the transport, the codec or the marshaller
    Transport,
}

impl FaultKind {
    /// Short label used in logs and metric attributes
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Execution => "execution",
            FaultKind::Transport => "transport",
        }
    }
}

/// Application-level error type for tunnel operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The remote service returned an error object (or HTTP status 500)
    #[error("Execution error: {0}")]
    Execution(RemoteError),

    /// The HTTP request could not be performed
    #[error("HTTP error: {0}")]
    Http(String),

    /// The HTTP endpoint answered with a non-success status other than 500
    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        /// Numeric status code of the response
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// WebSocket connect, send or receive failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The persistent connection is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// A reply could not be decoded (bad JSON, base64, date or content type)
    #[error("Decode error: {0}")]
    Decode(String),

    /// A value could not be marshalled to JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A raw value does not fit the declared type
    #[error("Cannot convert {found} to {expected}")]
    Conversion {
        /// The declared type
        expected: String,
        /// A description of the raw value that was received
        found: String,
    },

    /// A structure was given a field it does not declare
    #[error("Structure {structure} has no field {field}")]
    UnknownField {
        /// Name of the structured type
        structure: String,
        /// The rejected field name
        field: String,
    },

    /// A forward type reference names no registered type
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// An enumeration value is neither a known name nor a known code
    #[error("Unknown variant {variant} of enumeration {enumeration}")]
    UnknownEnumVariant {
        /// Name of the enumeration type
        enumeration: String,
        /// The rejected name or code, as text
        variant: String,
    },

    /// A transport name that the tunnel does not know
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    /// The tunnel could not be set up as configured
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Which fault category this error belongs to
    ///
    /// Only [`Error::Execution`] is an execution fault. Note that an HTTP
    /// status 500 is reported as `Execution` by the HTTP transport even
    /// though it is observed at the transport level.
    pub fn kind(&self) -> FaultKind {
        match self {
            Error::Execution(_) => FaultKind::Execution,
            _ => FaultKind::Transport,
        }
    }

    /// `true` if the remote service reported this error
    pub fn is_execution_fault(&self) -> bool {
        self.kind() == FaultKind::Execution
    }

    /// The remote error object, for execution faults
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Execution(remote) => Some(remote),
            _ => None,
        }
    }

    pub(crate) fn conversion(expected: impl std::fmt::Display, found: impl Into<String>) -> Self {
        Error::Conversion {
            expected: expected.to_string(),
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Error object as it appears in the `error` member of a reply
///
/// Only `message` is required. json-ws services usually also send a `code`
/// and may attach arbitrary `data`; both are kept when present.
///
/// # Examples
///
/// ```rust
/// use rpctunnel_core::RemoteError;
///
/// let error: RemoteError = serde_json::from_str(
///     r#"{"code":-32000,"message":"boom","data":{"line":3}}"#
/// ).unwrap();
/// assert_eq!(error.code, Some(-32000));
/// assert_eq!(error.message, "boom");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable error message
    pub message: String,

    /// Numeric error code, if the server sent one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    /// Additional error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RemoteError {
    /// Create an error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Create an error with a code and a message
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            data: None,
        }
    }
}

impl std::fmt::Display for RemoteError {
    /// Formats as "[code] message", or just the message when there is no code
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execution_fault_kind() {
        let error = Error::Execution(RemoteError::new("nope"));
        assert_eq!(error.kind(), FaultKind::Execution);
        assert!(error.is_execution_fault());
        assert_eq!(error.remote().map(|r| r.message.as_str()), Some("nope"));
    }

    #[test]
    fn test_transport_fault_kinds() {
        let errors = vec![
            Error::Http("refused".into()),
            Error::HttpStatus {
                status: 404,
                body: "not found".into(),
            },
            Error::WebSocket("reset".into()),
            Error::ConnectionClosed,
            Error::Decode("bad json".into()),
            Error::Serialization("NaN".into()),
            Error::conversion("integer", "string \"a\""),
            Error::UnknownType("Missing".into()),
            Error::UnknownField {
                structure: "RenderOptions".into(),
                field: "depth".into(),
            },
            Error::UnknownTransport("carrier-pigeon".into()),
            Error::Configuration("collector".into()),
        ];

        for error in errors {
            assert_eq!(error.kind(), FaultKind::Transport, "{}", error);
            assert!(error.remote().is_none());
        }
    }

    #[test]
    fn test_remote_error_display() {
        assert_eq!(RemoteError::with_code(-32601, "Method not found").to_string(), "[-32601] Method not found");
        assert_eq!(RemoteError::new("plain").to_string(), "plain");
    }

    #[test]
    fn test_remote_error_message_only() {
        let error: RemoteError = serde_json::from_value(json!({"message": "only"})).unwrap();
        assert_eq!(error, RemoteError::new("only"));
    }

    #[test]
    fn test_remote_error_keeps_data() {
        let error: RemoteError =
            serde_json::from_value(json!({"message": "bad", "code": 1, "data": {"field": "width"}})).unwrap();

        assert_eq!(error.code, Some(1));
        assert_eq!(error.data, Some(json!({"field": "width"})));

        let back = serde_json::to_value(&error).unwrap();
        assert_eq!(back["data"]["field"], "width");
    }

    #[test]
    fn test_serde_error_is_decode_fault() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let error: Error = serde_error.into();
        assert!(matches!(error, Error::Decode(_)));
    }

    #[test]
    fn test_fault_kind_labels() {
        assert_eq!(FaultKind::Execution.as_str(), "execution");
        assert_eq!(FaultKind::Transport.as_str(), "transport");
    }
}
