//! RemoteStopTransaction handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::remote_stop_transaction::{
    RemoteStopTransactionRequest, RemoteStopTransactionResponse,
};
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: RemoteStopTransactionRequest = parse("RemoteStopTransaction", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        transaction_id = req.transaction_id,
        "RemoteStopTransaction"
    );

    let status = station.remote_stop(req.transaction_id).await;
    respond(&RemoteStopTransactionResponse { status })
}
