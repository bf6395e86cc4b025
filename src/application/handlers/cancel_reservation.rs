//! CancelReservation handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::cancel_reservation::{
    CancelReservationRequest, CancelReservationResponse,
};
use rust_ocpp::v1_6::types::CancelReservationStatus;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: CancelReservationRequest = parse("CancelReservation", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        reservation_id = req.reservation_id,
        "CancelReservation"
    );

    let status = if station.cancel_reservation(req.reservation_id).await {
        CancelReservationStatus::Accepted
    } else {
        CancelReservationStatus::Rejected
    };
    respond(&CancelReservationResponse { status })
}
