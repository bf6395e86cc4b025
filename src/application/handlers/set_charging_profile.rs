//! SetChargingProfile handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::set_charging_profile::{
    SetChargingProfileRequest, SetChargingProfileResponse,
};
use rust_ocpp::v1_6::types::ChargingProfileStatus;
use serde_json::Value;
use tracing::info;

use crate::application::services::smart_charging::InstallOutcome;
use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: SetChargingProfileRequest = parse("SetChargingProfile", payload)?;
    let connector_id = req.connector_id as u32;
    info!(
        station_id = station.info.id.as_str(),
        connector_id,
        profile_id = req.cs_charging_profiles.charging_profile_id,
        stack_level = req.cs_charging_profiles.stack_level,
        purpose = ?req.cs_charging_profiles.charging_profile_purpose,
        "SetChargingProfile"
    );

    {
        let state = station.state.lock().await;
        if connector_id > state.ledger.connector_count() {
            return Err(OcppError::property_constraint(format!(
                "connectorId {connector_id} does not exist"
            )));
        }
    }

    let status = match station
        .set_charging_profile(connector_id, req.cs_charging_profiles)
        .await
    {
        InstallOutcome::Accepted => ChargingProfileStatus::Accepted,
        InstallOutcome::Rejected => ChargingProfileStatus::Rejected,
    };
    respond(&SetChargingProfileResponse { status })
}
