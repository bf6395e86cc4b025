//! Error types shared across the simulator.

use thiserror::Error;

/// Faults raised while bootstrapping or running a station outside of the
/// OCPP request/response path (configuration, templates, transport).
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// OCPP-J CALLERROR codes surfaced to the central system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormationViolation,
    PropertyConstraintViolation,
    OccurrenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::InternalError => "InternalError",
            Self::ProtocolError => "ProtocolError",
            Self::SecurityError => "SecurityError",
            Self::FormationViolation => "FormationViolation",
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::OccurrenceConstraintViolation => "OccurrenceConstraintViolation",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
            Self::GenericError => "GenericError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error answered to an inbound CALL as a CALLERROR frame.
#[derive(Debug, Error)]
#[error("{code}: {description}")]
pub struct OcppError {
    pub code: ErrorCode,
    pub description: String,
}

impl OcppError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn not_implemented(action: &str) -> Self {
        Self::new(ErrorCode::NotImplemented, format!("Unknown action '{action}'"))
    }

    pub fn not_supported(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotSupported, description)
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, description)
    }

    pub fn formation(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::FormationViolation, description)
    }

    pub fn property_constraint(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::PropertyConstraintViolation, description)
    }

    pub fn occurrence_constraint(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::OccurrenceConstraintViolation, description)
    }
}

/// Failure modes of an outbound station-initiated call.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Not connected to the central system")]
    NotConnected,

    #[error("Failed to send: {0}")]
    SendFailed(String),

    #[error("connection timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("CallError {code}: {description}")]
    CallError { code: String, description: String },
}
