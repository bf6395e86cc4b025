//! OCPP-J message framing
//!
//! JSON-over-WebSocket transport envelope, identical for every OCPP 1.x/2.x
//! version:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::Value;
use uuid::Uuid;

use super::errors::OcppError;

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// A parsed OCPP-J frame.
#[derive(Debug, Clone)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    /// Build a CALL with a fresh uniqueId.
    pub fn call(action: impl Into<String>, payload: Value) -> Self {
        Self::Call {
            unique_id: Uuid::new_v4().to_string(),
            action: action.into(),
            payload,
        }
    }

    /// Build the CALLRESULT answering `unique_id`.
    pub fn result(unique_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload,
        }
    }

    /// Build the CALLERROR answering `unique_id` from a typed error.
    pub fn error(unique_id: impl Into<String>, error: &OcppError) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error.code.as_str().to_string(),
            error_description: error.description.clone(),
            error_details: Value::Object(Default::default()),
        }
    }

    /// Parse a raw JSON text into an `OcppFrame`.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let arr: Vec<Value> =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

        let msg_type = arr
            .first()
            .and_then(Value::as_u64)
            .ok_or(FrameError::InvalidMessageType)?;

        match msg_type {
            MSG_TYPE_CALL => {
                if arr.len() < 4 {
                    return Err(FrameError::MissingFields { expected: 4, got: arr.len() });
                }
                Ok(Self::Call {
                    unique_id: string_field(&arr, 1, "uniqueId")?,
                    action: string_field(&arr, 2, "action")?,
                    payload: arr[3].clone(),
                })
            }
            MSG_TYPE_CALL_RESULT => {
                if arr.len() < 3 {
                    return Err(FrameError::MissingFields { expected: 3, got: arr.len() });
                }
                Ok(Self::CallResult {
                    unique_id: string_field(&arr, 1, "uniqueId")?,
                    payload: arr[2].clone(),
                })
            }
            MSG_TYPE_CALL_ERROR => {
                if arr.len() < 4 {
                    return Err(FrameError::MissingFields { expected: 4, got: arr.len() });
                }
                Ok(Self::CallError {
                    unique_id: string_field(&arr, 1, "uniqueId")?,
                    error_code: arr[2].as_str().unwrap_or("GenericError").to_string(),
                    error_description: arr
                        .get(3)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    error_details: arr
                        .get(4)
                        .cloned()
                        .unwrap_or(Value::Object(Default::default())),
                })
            }
            other => Err(FrameError::UnknownMessageType(other)),
        }
    }

    /// Serialize this frame to its wire representation.
    pub fn serialize(&self) -> String {
        let arr: Value = match self {
            Self::Call { unique_id, action, payload } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL.into()),
                Value::String(unique_id.clone()),
                Value::String(action.clone()),
                payload.clone(),
            ]),
            Self::CallResult { unique_id, payload } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL_RESULT.into()),
                Value::String(unique_id.clone()),
                payload.clone(),
            ]),
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL_ERROR.into()),
                Value::String(unique_id.clone()),
                Value::String(error_code.clone()),
                Value::String(error_description.clone()),
                error_details.clone(),
            ]),
        };

        // serde_json::to_string on a Value never fails
        serde_json::to_string(&arr).unwrap()
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }
}

fn string_field(arr: &[Value], index: usize, name: &'static str) -> Result<String, FrameError> {
    arr.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(FrameError::FieldTypeMismatch(name))
}

/// Errors raised while parsing an OCPP-J frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Message type is not a number")]
    InvalidMessageType,
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("Field type mismatch: {0} must be a string")]
    FieldTypeMismatch(&'static str),
}
