//! HTTP transport
//!
//! One POST per call, no retries and no timeouts of its own. The reply is
//! classified by status first and content type second:
//!
//! | Response                          | Outcome                                  |
//! |-----------------------------------|------------------------------------------|
//! | 500                               | execution fault, body is the error       |
//! | other non-2xx                     | [`Error::HttpStatus`]                    |
//! | `application/json`                | parsed as a reply                        |
//! | `application/octet-stream`        | the raw body bytes are the result        |
//! | anything else                     | [`Error::Decode`]                        |

use crate::pending::PendingCall;
use crate::transport::{Transport, TransportKind};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use rpctunnel_core::{codec, Envelope, Error, RemoteError, Result, Value};

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn send(&self, envelope: Envelope, call: PendingCall) {
        let body = match codec::encode_envelope(&envelope) {
            Ok(body) => body,
            Err(e) => return call.reject(e),
        };

        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            tracing::debug!(id = envelope.id, method = %envelope.method, "POST envelope");
            let outcome = post(&client, &url, body).await;
            call.settle(outcome);
        });
    }
}

async fn post(client: &reqwest::Client, url: &str, body: String) -> Result<Value> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, JSON)
        .body(body)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        return Err(Error::Execution(remote_error_from_body(text)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(media_type)
        .unwrap_or_default();

    match content_type.as_str() {
        JSON => {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            let reply = codec::decode_reply_bytes(&bytes)?;
            reply.into_result().map(Value::from_json)
        }
        OCTET_STREAM => {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;
            Ok(Value::Binary(bytes.to_vec()))
        }
        other => Err(Error::Decode(format!("unexpected content type {:?}", other))),
    }
}

/// `Content-Type` without parameters, lowercased
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Error object of a status 500 body
///
/// A JSON reply carrying an `error` object yields that object; any other
/// body is taken as the message.
fn remote_error_from_body(body: String) -> RemoteError {
    match codec::decode_reply(&body) {
        Ok(reply) => match reply.error {
            Some(error) => error,
            None => RemoteError::new(body),
        },
        Err(_) => RemoteError::new(body),
    }
}
