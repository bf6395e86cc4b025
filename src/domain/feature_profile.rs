//! OCPP 1.6 feature profiles a station can advertise.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureProfile {
    Core,
    FirmwareManagement,
    LocalAuthListManagement,
    Reservation,
    SmartCharging,
    RemoteTrigger,
}

impl FeatureProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "Core",
            Self::FirmwareManagement => "FirmwareManagement",
            Self::LocalAuthListManagement => "LocalAuthListManagement",
            Self::Reservation => "Reservation",
            Self::SmartCharging => "SmartCharging",
            Self::RemoteTrigger => "RemoteTrigger",
        }
    }

    /// All profiles, in the order they are reported in
    /// `SupportedFeatureProfiles`.
    pub fn all() -> [FeatureProfile; 6] {
        [
            Self::Core,
            Self::FirmwareManagement,
            Self::LocalAuthListManagement,
            Self::Reservation,
            Self::SmartCharging,
            Self::RemoteTrigger,
        ]
    }
}

impl std::fmt::Display for FeatureProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
