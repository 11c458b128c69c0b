//! Envelope: the unit exchanged between two ports.
//!
//! On the wire an envelope is a JSON object:
//!
//! ```text
//! {"kind":"request","id":7,"payload":{...}}
//! {"kind":"response","id":7,"payload":{...}}
//! {"kind":"response","id":7,"error":{"message":"...","data":{...}}}
//! {"kind":"notification","payload":{...}}
//! {"kind":"notification","cancel":7}
//! ```
//!
//! The last form is the cancel notice. It is marked by the envelope-level
//! `cancel` field and carries no payload, so any user payload stays a plain
//! notification.
//!
//! Decoding is strict about structure (an id on every request/response and
//! never on a notification, never both `payload` and `error`) and lenient
//! about absent payloads, which decode as JSON `null`.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id linking a request to its response.
pub type RequestId = u64;

/// Failure reported by the peer's request handler.
///
/// This is both the wire shape of a failed response and the error type
/// request handlers return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail for the caller.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&str> for RemoteError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RemoteError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// One message exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub enum Envelope {
    Request {
        id: RequestId,
        payload: Value,
    },
    Response {
        id: RequestId,
        outcome: Result<Value, RemoteError>,
    },
    Notification {
        payload: Value,
    },
    /// Best-effort notice that the sender withdrew request `id`.
    Cancel {
        id: RequestId,
    },
}

impl Envelope {
    /// Notice asking the peer to abandon work on `id`.
    pub fn cancel_notice(id: RequestId) -> Self {
        Self::Cancel { id }
    }

    /// Wire name of the envelope kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
            Self::Notification { .. } => "notification",
            Self::Cancel { .. } => "cancel",
        }
    }

    pub fn encode(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Kind {
    Request,
    Response,
    Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEnvelope {
    kind: Kind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RemoteError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancel: Option<RequestId>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MalformedEnvelope(&'static str);

impl fmt::Display for MalformedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed envelope: {}", self.0)
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = MalformedEnvelope;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        match wire.kind {
            Kind::Request | Kind::Response if wire.cancel.is_some() => {
                Err(MalformedEnvelope("cancel marker outside a notification"))
            }
            Kind::Request => {
                let id = wire.id.ok_or(MalformedEnvelope("request without id"))?;
                if wire.error.is_some() {
                    return Err(MalformedEnvelope("request carries an error"));
                }
                Ok(Self::Request {
                    id,
                    payload: wire.payload.unwrap_or(Value::Null),
                })
            }
            Kind::Response => {
                let id = wire.id.ok_or(MalformedEnvelope("response without id"))?;
                let outcome = match (wire.payload, wire.error) {
                    (Some(_), Some(_)) => {
                        return Err(MalformedEnvelope("response carries payload and error"))
                    }
                    (_, Some(error)) => Err(error),
                    (payload, None) => Ok(payload.unwrap_or(Value::Null)),
                };
                Ok(Self::Response { id, outcome })
            }
            Kind::Notification => {
                if wire.id.is_some() {
                    return Err(MalformedEnvelope("notification carries an id"));
                }
                if wire.error.is_some() {
                    return Err(MalformedEnvelope("notification carries an error"));
                }
                if let Some(id) = wire.cancel {
                    if wire.payload.is_some() {
                        return Err(MalformedEnvelope("cancel notice carries a payload"));
                    }
                    return Ok(Self::Cancel { id });
                }
                Ok(Self::Notification {
                    payload: wire.payload.unwrap_or(Value::Null),
                })
            }
        }
    }
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Request { id, payload } => Self {
                kind: Kind::Request,
                id: Some(id),
                payload: Some(payload),
                error: None,
                cancel: None,
            },
            Envelope::Response { id, outcome } => {
                let (payload, error) = match outcome {
                    Ok(payload) => (Some(payload), None),
                    Err(error) => (None, Some(error)),
                };
                Self {
                    kind: Kind::Response,
                    id: Some(id),
                    payload,
                    error,
                    cancel: None,
                }
            }
            Envelope::Notification { payload } => Self {
                kind: Kind::Notification,
                id: None,
                payload: Some(payload),
                error: None,
                cancel: None,
            },
            Envelope::Cancel { id } => Self {
                kind: Kind::Notification,
                id: None,
                payload: None,
                error: None,
                cancel: Some(id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn wire(envelope: &Envelope) -> Value {
        serde_json::from_slice(&envelope.encode().unwrap()).unwrap()
    }

    #[test]
    fn request_wire_shape() {
        let envelope = Envelope::Request {
            id: 3,
            payload: json!({"op": "add"}),
        };
        assert_eq!(
            wire(&envelope),
            json!({"kind": "request", "id": 3, "payload": {"op": "add"}})
        );
    }

    #[test]
    fn failed_response_has_error_and_no_payload() {
        let envelope = Envelope::Response {
            id: 9,
            outcome: Err(RemoteError::new("boom").with_data(json!({"code": 7}))),
        };
        assert_eq!(
            wire(&envelope),
            json!({"kind": "response", "id": 9, "error": {"message": "boom", "data": {"code": 7}}})
        );
    }

    #[test]
    fn notification_has_no_id() {
        let envelope = Envelope::Notification {
            payload: json!({"event": "ping"}),
        };
        assert_eq!(
            wire(&envelope),
            json!({"kind": "notification", "payload": {"event": "ping"}})
        );
    }

    #[test]
    fn null_result_survives_the_wire() {
        let envelope = Envelope::Response {
            id: 1,
            outcome: Ok(Value::Null),
        };
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn absent_payload_decodes_as_null() {
        let decoded = Envelope::decode(br#"{"kind":"notification"}"#).unwrap();
        assert_eq!(
            decoded,
            Envelope::Notification {
                payload: Value::Null
            }
        );
    }

    #[test]
    fn rejects_request_without_id() {
        assert!(Envelope::decode(br#"{"kind":"request","payload":1}"#).is_err());
    }

    #[test]
    fn rejects_response_with_payload_and_error() {
        let raw = br#"{"kind":"response","id":1,"payload":1,"error":{"message":"x"}}"#;
        let err = Envelope::decode(raw).unwrap_err();
        assert!(err.to_string().contains("payload and error"));
    }

    #[test]
    fn rejects_notification_with_id() {
        assert!(Envelope::decode(br#"{"kind":"notification","id":4,"payload":1}"#).is_err());
    }

    #[test]
    fn rejects_unknown_kind_and_bad_error_body() {
        assert!(Envelope::decode(br#"{"kind":"shout","payload":1}"#).is_err());
        assert!(Envelope::decode(br#"{"kind":"response","id":1,"error":"nope"}"#).is_err());
        assert!(Envelope::decode(b"not json").is_err());
    }

    #[test]
    fn cancel_notice_wire_shape() {
        let notice = Envelope::cancel_notice(42);
        assert_eq!(wire(&notice), json!({"kind": "notification", "cancel": 42}));
        assert_eq!(Envelope::decode(&notice.encode().unwrap()).unwrap(), notice);
    }

    #[test]
    fn cancel_shaped_payload_stays_a_notification() {
        let raw = br#"{"kind":"notification","payload":{"$cancel":7}}"#;
        assert_eq!(
            Envelope::decode(raw).unwrap(),
            Envelope::Notification {
                payload: json!({"$cancel": 7})
            }
        );
    }

    #[test]
    fn rejects_misplaced_cancel_marker() {
        assert!(Envelope::decode(br#"{"kind":"notification","cancel":1,"payload":2}"#).is_err());
        assert!(Envelope::decode(br#"{"kind":"request","id":1,"cancel":1}"#).is_err());
    }
}
