//! UnlockConnector handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::unlock_connector::{
    UnlockConnectorRequest, UnlockConnectorResponse,
};
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: UnlockConnectorRequest = parse("UnlockConnector", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        connector_id = req.connector_id,
        "UnlockConnector"
    );

    let status = station.unlock_connector(req.connector_id as u32).await;
    respond(&UnlockConnectorResponse { status })
}
