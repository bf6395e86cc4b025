//! TriggerMessage handler
//!
//! The response goes out first; the triggered message is pushed right after
//! from a spawned task, as the protocol expects.

use std::sync::Arc;

use rust_ocpp::v1_6::messages::trigger_message::{TriggerMessageRequest, TriggerMessageResponse};
use rust_ocpp::v1_6::types::TriggerMessageStatus;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: TriggerMessageRequest = parse("TriggerMessage", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        requested = ?req.requested_message,
        connector_id = ?req.connector_id,
        "TriggerMessage"
    );

    let connector_id = req.connector_id.map(|id| id as u32);
    if let Some(id) = connector_id {
        let state = station.state.lock().await;
        if id == 0 || id > state.ledger.connector_count() {
            return Err(OcppError::property_constraint(format!(
                "connectorId {id} does not exist"
            )));
        }
    }

    let trigger = req.requested_message;
    let triggered = station.clone();
    tokio::spawn(async move {
        // Let the Accepted response hit the wire before the triggered
        // message does.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        triggered.execute_trigger(trigger, connector_id).await;
    });

    respond(&TriggerMessageResponse {
        status: TriggerMessageStatus::Accepted,
    })
}
