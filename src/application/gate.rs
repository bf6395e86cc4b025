//! Feature-profile gate.
//!
//! Every inbound command is checked against the feature profiles the
//! station advertises before any state is touched. The check itself has no
//! side effects beyond a warning naming the command and the missing profile.

use tracing::warn;

use crate::domain::{FeatureProfile, StationInfo};

/// True iff `profile` is enabled on the station.
pub fn check(station: &StationInfo, profile: FeatureProfile, command: &str) -> bool {
    if station.supports(profile) {
        return true;
    }
    warn!(
        station_id = station.id.as_str(),
        command,
        missing_profile = profile.as_str(),
        "Command rejected: feature profile not enabled"
    );
    false
}

/// The feature profile an action belongs to. `None` for unknown actions.
pub fn required_profile(action: &str) -> Option<FeatureProfile> {
    match action {
        "RemoteStartTransaction" | "RemoteStopTransaction" | "ChangeAvailability"
        | "UnlockConnector" | "DataTransfer" | "Reset" | "GetConfiguration"
        | "ChangeConfiguration" => Some(FeatureProfile::Core),
        "SetChargingProfile" | "ClearChargingProfile" | "GetCompositeSchedule" => {
            Some(FeatureProfile::SmartCharging)
        }
        "ReserveNow" | "CancelReservation" => Some(FeatureProfile::Reservation),
        "TriggerMessage" => Some(FeatureProfile::RemoteTrigger),
        _ => None,
    }
}
