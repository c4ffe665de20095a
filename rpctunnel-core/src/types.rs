//! Wire types exchanged with a json-ws service
//!
//! The protocol is a JSON-RPC 2.0 variant with three message shapes:
//!
//! 1. **Envelope**: a call sent by the tunnel, always carrying a numeric id
//!    and a positional `params` array.
//! 2. **Response**: the reply to one envelope, carrying the same numeric id
//!    and either a `result` or an `error` object.
//! 3. **Event push**: sent unsolicited over the persistent transport. It has
//!    the shape of a response, but its `id` member holds the event name.
//!
//! Responses and event pushes share one Rust type, [`Reply`]. Which of the
//! two a given reply is gets decided by [`Reply::into_frame`], purely from the
//! type of its `id` member.

use crate::error::{Error, RemoteError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC protocol version sent in every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifying member of a reply
///
/// Numeric ids correlate a response with a pending call; string ids name an
/// event. `Null` (or a missing member) addresses nothing.
///
/// # Examples
///
/// ```rust
/// use rpctunnel_core::Id;
///
/// let call: Id = 42u64.into();
/// let event: Id = "testEvent".into();
///
/// assert_eq!(call.to_string(), "42");
/// assert_eq!(event.to_string(), "\"testEvent\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Call identifier assigned by the tunnel
    Number(i64),
    /// Event name of a server push
    String(String),
    /// No identifier
    #[default]
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    /// Values above `i64::MAX` wrap; a tunnel never gets that far.
    fn from(n: u64) -> Self {
        Id::Number(n as i64)
    }
}

/// A call request
///
/// Serializes as `{"jsonrpc":"2.0","method":...,"params":[...],"id":...}`.
/// `params` is always an array of already-marshalled values, in the order of
/// the method's declared parameters.
///
/// # Examples
///
/// ```rust
/// use rpctunnel_core::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::new("sum", vec![json!(2), json!(3)], 7);
/// let text = serde_json::to_string(&envelope).unwrap();
/// assert_eq!(text, r#"{"jsonrpc":"2.0","method":"sum","params":[2,3],"id":7}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Fully qualified method name, e.g. `ns1.sub1.method1`
    pub method: String,
    /// Positional parameters
    pub params: Vec<Value>,
    /// Call identifier, unique for the lifetime of one tunnel
    pub id: u64,
}

impl Envelope {
    /// Create an envelope with the protocol version filled in
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A reply received from the service: a call response or an event push
///
/// All members are optional on the wire; a missing `result` reads as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reply {
    /// Call id (number) or event name (string)
    #[serde(default)]
    pub id: Id,
    /// Result value, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error object, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl Reply {
    /// A successful response to call `id`
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// A failed response to call `id`
    pub fn failure(id: u64, error: RemoteError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// An event push
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self {
            id: Id::String(name.into()),
            result: Some(data),
            error: None,
        }
    }

    /// Turn the reply into the outcome of a call
    ///
    /// The presence of `error` decides: it becomes an execution fault,
    /// otherwise the (possibly missing, hence `null`) result is returned.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::Execution(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Classify the reply by its `id` member
    pub fn into_frame(self) -> Frame {
        match self.id {
            Id::Number(n) => match u64::try_from(n) {
                Ok(id) => Frame::Response {
                    id,
                    outcome: match self.error {
                        Some(error) => Err(error),
                        None => Ok(self.result.unwrap_or(Value::Null)),
                    },
                },
                Err(_) => Frame::Unaddressed,
            },
            Id::String(name) => Frame::Event {
                name,
                data: self.result.unwrap_or(Value::Null),
            },
            Id::Null => Frame::Unaddressed,
        }
    }
}

/// A reply classified for routing
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Response to the call with this id
    Response {
        /// Call id
        id: u64,
        /// `result` on success, the error object otherwise
        outcome: std::result::Result<Value, RemoteError>,
    },
    /// Server-pushed event
    Event {
        /// Event name, taken from the `id` member
        name: String,
        /// The event's `result` member
        data: Value,
    },
    /// A reply without a usable id; it is ignored
    Unaddressed,
}
