//! Wire types exchanged with the target process.
//!
//! One request and one response travel per connection. The response is
//! decoded from a raw `Value` so the result/error invariant can be checked
//! before anything is interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ChannelError;

// ─── Request ─────────────────────────────────────────────────────────────────

/// A single call sent to the target process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRequest {
    /// Correlation token, fresh for every request.
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl ChannelRequest {
    /// Create a request with a new correlation token.
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            params,
        }
    }
}

// ─── Response ────────────────────────────────────────────────────────────────

/// Structured error object returned by the target process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Exactly one of a result payload or a remote error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Result(Value),
    Error(RemoteError),
}

/// A decoded, shape-checked reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResponse {
    pub id: Option<String>,
    pub body: ResponseBody,
}

impl ChannelResponse {
    /// Build a success reply (used by test targets and tooling).
    pub fn result(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: Some(id.into()),
            body: ResponseBody::Result(result),
        }
    }

    /// Build an error reply (used by test targets and tooling).
    pub fn error(id: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            body: ResponseBody::Error(RemoteError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Validate and decode a raw reply object.
    ///
    /// A `null` field counts as absent. Both-present and both-absent replies
    /// are rejected whole; nothing is partially parsed.
    pub fn from_value(channel: &str, value: Value) -> Result<Self, ChannelError> {
        let Value::Object(mut obj) = value else {
            return Err(ChannelError::protocol(
                channel,
                "response is not a JSON object",
            ));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                return Err(ChannelError::protocol(
                    channel,
                    format!("response id has unsupported type: {other}"),
                ))
            }
        };

        let result = obj.remove("result").filter(|v| !v.is_null());
        let error = obj.remove("error").filter(|v| !v.is_null());

        let body = match (result, error) {
            (Some(result), None) => ResponseBody::Result(result),
            (None, Some(error)) => {
                let remote: RemoteError = serde_json::from_value(error).map_err(|e| {
                    ChannelError::protocol(channel, format!("malformed error object: {e}"))
                })?;
                ResponseBody::Error(remote)
            }
            (Some(_), Some(_)) => {
                return Err(ChannelError::protocol(
                    channel,
                    "response carries both result and error",
                ))
            }
            (None, None) => {
                return Err(ChannelError::protocol(
                    channel,
                    "response missing both result and error",
                ))
            }
        };

        Ok(Self { id, body })
    }

    /// Encode into the wire object.
    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(id) = &self.id {
            obj.insert("id".into(), Value::String(id.clone()));
        }
        match &self.body {
            ResponseBody::Result(result) => {
                obj.insert("result".into(), result.clone());
            }
            ResponseBody::Error(error) => {
                obj.insert(
                    "error".into(),
                    serde_json::to_value(error).unwrap_or(Value::Null),
                );
            }
        }
        Value::Object(obj)
    }

    /// Convert into the call outcome, turning a remote error into
    /// [`ChannelError::Remote`].
    pub fn into_result(self) -> Result<Value, ChannelError> {
        match self.body {
            ResponseBody::Result(value) => Ok(value),
            ResponseBody::Error(RemoteError {
                code,
                message,
                data,
            }) => Err(ChannelError::Remote {
                code,
                message,
                data,
            }),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::errors::ChannelErrorKind;
    use serde_json::json;

    const CH: &str = r"\\.\pipe\Test_MCP_Request";

    #[test]
    fn test_request_ids_are_unique() {
        let a = ChannelRequest::new("list-tools", Value::Null);
        let b = ChannelRequest::new("list-tools", Value::Null);
        assert_ne!(a.id, b.id);
        assert_eq!(a.method, "list-tools");
    }

    #[test]
    fn test_request_serialization() {
        let req = ChannelRequest::new("click", json!({"x": 1}));
        let text = serde_json::to_string(&req).unwrap();
        assert!(text.contains("\"method\":\"click\""));
        assert!(text.contains("\"params\":{\"x\":1}"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_decode_result() {
        let resp =
            ChannelResponse::from_value(CH, json!({"id": "a", "result": {"ok": true}})).unwrap();
        assert_eq!(resp.id.as_deref(), Some("a"));
        assert_eq!(resp.into_result().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_decode_remote_error() {
        let resp = ChannelResponse::from_value(
            CH,
            json!({"id": "a", "result": null, "error": {"code": -32601, "message": "Method not found"}}),
        )
        .unwrap();
        match resp.into_result().unwrap_err() {
            ChannelError::Remote { code, message, .. } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_both_present() {
        let err = ChannelResponse::from_value(
            CH,
            json!({"result": 1, "error": {"code": 1, "message": "x"}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[test]
    fn test_decode_rejects_both_absent() {
        let err = ChannelResponse::from_value(CH, json!({"id": "a"})).unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);

        let err =
            ChannelResponse::from_value(CH, json!({"result": null, "error": null})).unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let err = ChannelResponse::from_value(CH, json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[test]
    fn test_decode_rejects_malformed_error_object() {
        let err =
            ChannelResponse::from_value(CH, json!({"error": {"message": "no code"}})).unwrap_err();
        assert_eq!(err.kind(), ChannelErrorKind::Protocol);
    }

    #[test]
    fn test_numeric_id_accepted() {
        let resp = ChannelResponse::from_value(CH, json!({"id": 7, "result": []})).unwrap();
        assert_eq!(resp.id.as_deref(), Some("7"));
    }

    #[test]
    fn test_to_value_round_trip_shape() {
        let v = ChannelResponse::error("a", 5, "boom").to_value();
        assert_eq!(v["error"]["code"], 5);
        assert!(v.get("result").is_none());
    }
}
