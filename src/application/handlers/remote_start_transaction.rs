//! RemoteStartTransaction handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::remote_start_transaction::{
    RemoteStartTransactionRequest, RemoteStartTransactionResponse,
};
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: RemoteStartTransactionRequest = parse("RemoteStartTransaction", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        connector_id = ?req.connector_id,
        id_tag = req.id_tag.as_str(),
        "RemoteStartTransaction"
    );

    let status = station
        .remote_start(
            req.connector_id.map(|id| id as u32),
            req.id_tag,
            req.charging_profile,
        )
        .await;

    respond(&RemoteStartTransactionResponse { status })
}
