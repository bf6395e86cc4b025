//! External concerns: transport, pending calls, connector-state snapshots.

pub mod pending;
pub mod persistence;
pub mod ws;

use async_trait::async_trait;
use serde_json::Value;

use crate::support::errors::RequestError;
use crate::support::ocpp_frame::OcppFrame;

/// Station-side transport sink.
///
/// `call` issues a station-initiated CALL and resolves with the CSMS
/// response payload; `respond` writes a CALLRESULT/CALLERROR answering an
/// inbound CALL. Mocked in coordinator tests.
#[async_trait]
pub trait OcppTransport: Send + Sync {
    async fn call(&self, action: &str, payload: Value) -> Result<Value, RequestError>;
    async fn respond(&self, frame: OcppFrame) -> Result<(), RequestError>;
}
