//! GetCompositeSchedule handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::get_composite_schedule::{
    GetCompositeScheduleRequest, GetCompositeScheduleResponse,
};
use rust_ocpp::v1_6::types::GetCompositeScheduleStatus;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: GetCompositeScheduleRequest = parse("GetCompositeSchedule", payload)?;
    let connector_id = req.connector_id as u32;
    info!(
        station_id = station.info.id.as_str(),
        connector_id,
        duration = req.duration,
        "GetCompositeSchedule"
    );

    {
        let state = station.state.lock().await;
        if connector_id > state.ledger.connector_count() {
            return Err(OcppError::property_constraint(format!(
                "connectorId {connector_id} does not exist"
            )));
        }
    }

    match station.composite_schedule(connector_id, req.duration).await {
        Some(schedule) => {
            let schedule_start = schedule.start_schedule;
            respond(&GetCompositeScheduleResponse {
                status: GetCompositeScheduleStatus::Accepted,
                connector_id: Some(req.connector_id),
                schedule_start,
                charging_schedule: Some(schedule),
            })
        }
        None => respond(&GetCompositeScheduleResponse {
            status: GetCompositeScheduleStatus::Rejected,
            connector_id: None,
            schedule_start: None,
            charging_schedule: None,
        }),
    }
}
