//! Inbound command handlers, one module per OCPP action.
//!
//! Dispatch order: feature-profile gate first, then payload parsing, then
//! the action handler. Unknown actions answer `NotImplemented`, gated-off
//! actions `NotSupported`, unparseable payloads `FormationViolation`.

pub mod cancel_reservation;
pub mod change_availability;
pub mod change_configuration;
pub mod clear_charging_profile;
pub mod data_transfer;
pub mod get_composite_schedule;
pub mod get_configuration;
pub mod remote_start_transaction;
pub mod remote_stop_transaction;
pub mod reserve_now;
pub mod reset;
pub mod set_charging_profile;
pub mod trigger_message;
pub mod unlock_connector;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::application::gate;
use crate::station::ChargingStation;
use crate::support::errors::OcppError;

pub async fn dispatch(
    station: &Arc<ChargingStation>,
    action: &str,
    payload: &Value,
) -> Result<Value, OcppError> {
    let Some(profile) = gate::required_profile(action) else {
        return Err(OcppError::not_implemented(action));
    };
    if !gate::check(&station.info, profile, action) {
        return Err(OcppError::not_supported(format!(
            "{action} requires the {profile} feature profile"
        )));
    }

    match action {
        "RemoteStartTransaction" => remote_start_transaction::handle(station, payload).await,
        "RemoteStopTransaction" => remote_stop_transaction::handle(station, payload).await,
        "ChangeAvailability" => change_availability::handle(station, payload).await,
        "SetChargingProfile" => set_charging_profile::handle(station, payload).await,
        "ClearChargingProfile" => clear_charging_profile::handle(station, payload).await,
        "GetCompositeSchedule" => get_composite_schedule::handle(station, payload).await,
        "ReserveNow" => reserve_now::handle(station, payload).await,
        "CancelReservation" => cancel_reservation::handle(station, payload).await,
        "TriggerMessage" => trigger_message::handle(station, payload).await,
        "UnlockConnector" => unlock_connector::handle(station, payload).await,
        "DataTransfer" => data_transfer::handle(station, payload).await,
        "Reset" => reset::handle(station, payload).await,
        "GetConfiguration" => get_configuration::handle(station, payload).await,
        "ChangeConfiguration" => change_configuration::handle(station, payload).await,
        other => Err(OcppError::not_implemented(other)),
    }
}

/// Deserialize an inbound payload; failure is a `FormationViolation`.
pub(crate) fn parse<T: DeserializeOwned>(action: &str, payload: &Value) -> Result<T, OcppError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| OcppError::formation(format!("{action}: {e}")))
}

/// Serialize a response payload.
pub(crate) fn respond<T: Serialize>(response: &T) -> Result<Value, OcppError> {
    serde_json::to_value(response)
        .map_err(|e| OcppError::internal(format!("response serialization failed: {e}")))
}
