//! Reset handler
//!
//! Accepted immediately; stopping transactions and re-announcing the
//! station happens right after the response is on the wire.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::reset::{ResetRequest, ResetResponse};
use rust_ocpp::v1_6::types::ResetResponseStatus;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: ResetRequest = parse("Reset", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        kind = ?req.kind,
        "Reset"
    );

    let kind = req.kind;
    let resetting = station.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        resetting.reset(kind).await;
    });

    respond(&ResetResponse {
        status: ResetResponseStatus::Accepted,
    })
}
