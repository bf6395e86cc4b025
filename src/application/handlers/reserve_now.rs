//! ReserveNow handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::reserve_now::{ReserveNowRequest, ReserveNowResponse};
use serde_json::Value;
use tracing::info;

use crate::domain::Reservation;
use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: ReserveNowRequest = parse("ReserveNow", payload)?;
    let connector_id = req.connector_id as u32;
    info!(
        station_id = station.info.id.as_str(),
        connector_id,
        reservation_id = req.reservation_id,
        id_tag = req.id_tag.as_str(),
        expiry = %req.expiry_date,
        "ReserveNow"
    );

    {
        let state = station.state.lock().await;
        if connector_id > state.ledger.connector_count() {
            return Err(OcppError::property_constraint(format!(
                "connectorId {connector_id} does not exist"
            )));
        }
    }

    let status = station
        .reserve_now(Reservation {
            reservation_id: req.reservation_id,
            connector_id,
            id_tag: req.id_tag,
            parent_id_tag: req.parent_id_tag,
            expiry_date: req.expiry_date,
        })
        .await;
    respond(&ReserveNowResponse { status })
}
