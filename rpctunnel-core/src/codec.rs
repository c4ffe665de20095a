//! Codec for envelopes and replies
//!
//! Thin wrappers around `serde_json` that map failures onto the tunnel's
//! fault categories: anything going out is a serialization fault, anything
//! coming in is a decode fault.
//!
//! # Examples
//!
//! ```rust
//! use rpctunnel_core::{codec, Envelope, Frame};
//!
//! let text = codec::encode_envelope(&Envelope::new("ping", vec![], 1)).unwrap();
//! assert!(text.contains("\"method\":\"ping\""));
//!
//! let reply = codec::decode_reply(r#"{"id":1,"result":"pong"}"#).unwrap();
//! assert!(matches!(reply.into_frame(), Frame::Response { id: 1, .. }));
//! ```

use crate::error::{Error, Result};
use crate::types::{Envelope, Reply};
use serde::{de::DeserializeOwned, Serialize};

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode an envelope for sending
pub fn encode_envelope(envelope: &Envelope) -> Result<String> {
    encode(envelope)
}

/// Decode a reply from text
///
/// The body must be a single JSON object. Batches are not part of this
/// protocol and decode as an error.
pub fn decode_reply(data: &str) -> Result<Reply> {
    decode_as(data)
}

/// Decode a reply from raw bytes, which must be UTF-8 JSON
pub fn decode_reply_bytes(data: &[u8]) -> Result<Reply> {
    serde_json::from_slice(data).map_err(|e| Error::Decode(e.to_string()))
}

/// Decode a JSON string to a specific type
pub fn decode_as<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Decode(e.to_string()))
}
