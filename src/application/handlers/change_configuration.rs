//! ChangeConfiguration handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::change_configuration::{
    ChangeConfigurationRequest, ChangeConfigurationResponse,
};
use rust_ocpp::v1_6::types::ConfigurationStatus;
use serde_json::Value;
use tracing::info;

use crate::domain::ocpp_config::ChangeOutcome;
use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: ChangeConfigurationRequest = parse("ChangeConfiguration", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        key = req.key.as_str(),
        value = req.value.as_str(),
        "ChangeConfiguration"
    );

    let outcome = {
        let mut state = station.state.lock().await;
        state.configuration.set(&req.key, &req.value)
    };
    let status = match outcome {
        ChangeOutcome::Accepted => ConfigurationStatus::Accepted,
        ChangeOutcome::Rejected => ConfigurationStatus::Rejected,
        ChangeOutcome::NotSupported => ConfigurationStatus::NotSupported,
    };
    respond(&ChangeConfigurationResponse { status })
}
