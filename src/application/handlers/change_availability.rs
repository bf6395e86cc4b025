//! ChangeAvailability handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::change_availability::{
    ChangeAvailabilityRequest, ChangeAvailabilityResponse,
};
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: ChangeAvailabilityRequest = parse("ChangeAvailability", payload)?;
    let connector_id = req.connector_id as u32;
    info!(
        station_id = station.info.id.as_str(),
        connector_id,
        kind = ?req.kind,
        "ChangeAvailability"
    );

    {
        let state = station.state.lock().await;
        if connector_id > state.ledger.connector_count() {
            return Err(OcppError::property_constraint(format!(
                "connectorId {connector_id} does not exist"
            )));
        }
    }

    let status = station.change_availability(connector_id, req.kind).await;
    respond(&ChangeAvailabilityResponse { status })
}
