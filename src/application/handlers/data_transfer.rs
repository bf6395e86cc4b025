//! DataTransfer handler
//!
//! The simulator advertises no vendor extensions, so every vendor id is
//! answered with `UnknownVendorId`.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::data_transfer::{DataTransferRequest, DataTransferResponse};
use rust_ocpp::v1_6::types::DataTransferStatus;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: DataTransferRequest = parse("DataTransfer", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        vendor_id = req.vendor_string.as_str(),
        message_id = ?req.message_id,
        "DataTransfer"
    );

    respond(&DataTransferResponse {
        status: DataTransferStatus::UnknownVendorId,
        data: None,
    })
}
