//! ClearChargingProfile handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::clear_charging_profile::{
    ClearChargingProfileRequest, ClearChargingProfileResponse,
};
use rust_ocpp::v1_6::types::ClearChargingProfileStatus;
use serde_json::Value;
use tracing::info;

use crate::domain::ClearProfilesFilter;
use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: ClearChargingProfileRequest = parse("ClearChargingProfile", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        id = ?req.id,
        connector_id = ?req.connector_id,
        purpose = ?req.charging_profile_purpose,
        stack_level = ?req.stack_level,
        "ClearChargingProfile"
    );

    let filter = ClearProfilesFilter {
        id: req.id,
        purpose: req.charging_profile_purpose,
        stack_level: req.stack_level,
    };
    let connector_id = req.connector_id.map(|id| id as u32);
    let cleared = station.clear_charging_profiles(connector_id, &filter).await;

    let status = if cleared {
        ClearChargingProfileStatus::Accepted
    } else {
        ClearChargingProfileStatus::Unknown
    };
    respond(&ClearChargingProfileResponse { status })
}
