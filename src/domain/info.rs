//! Station identity and electrical constants, frozen at boot.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::support::errors::OcppError;
use crate::support::round_to;

use super::feature_profile::FeatureProfile;

/// AC or DC output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentType {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
}

/// Immutable station-wide facts derived from the template.
#[derive(Debug, Clone)]
pub struct StationInfo {
    /// Station identifier, `<baseName>-<index>`.
    pub id: String,
    /// Stable hash of the identifier, reported to the supervisor.
    pub hash_id: String,
    pub vendor: String,
    pub model: String,
    pub firmware_version: Option<String>,
    pub current_out_type: CurrentType,
    /// Nominal output voltage (line-to-neutral for AC), volts.
    pub voltage_out: f64,
    /// 1 or 3.
    pub number_of_phases: u32,
    /// Aggregate station power, watts.
    pub maximum_power: f64,
    /// Divides the aggregate power budget among connectors. Always > 0 for
    /// a validly loaded template; the synthesizer still asserts it.
    pub power_divider: u32,
    pub main_voltage_meter_values: bool,
    pub phase_line_to_line_voltage_meter_values: bool,
    pub custom_value_limitation_meter_values: bool,
    pub enabled_feature_profiles: HashSet<FeatureProfile>,
}

impl StationInfo {
    pub fn supports(&self, profile: FeatureProfile) -> bool {
        self.enabled_feature_profiles.contains(&profile)
    }

    /// Maximum power one connector may draw, watts.
    ///
    /// A zero divider is a template/bootstrap bug and surfaces as an OCPP
    /// `InternalError` per the meter-value contract.
    pub fn connector_maximum_available_power(&self) -> Result<f64, OcppError> {
        if self.power_divider == 0 {
            return Err(OcppError::internal("powerDivider must be > 0"));
        }
        Ok(round_to(self.maximum_power / self.power_divider as f64, 0))
    }

    /// Comma-separated `SupportedFeatureProfiles` value, in canonical order.
    pub fn supported_feature_profiles(&self) -> String {
        FeatureProfile::all()
            .iter()
            .filter(|p| self.enabled_feature_profiles.contains(p))
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Stable hexadecimal hash of a station identifier.
pub fn station_hash_id(station_id: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    station_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Per-phase AC amperage available from `max_power` watts at `voltage_out`.
pub fn ac_amperage_per_phase(number_of_phases: u32, max_power: f64, voltage_out: f64) -> f64 {
    max_power / (voltage_out * number_of_phases.max(1) as f64)
}

/// DC amperage available from `max_power` watts at `voltage_out`.
pub fn dc_amperage(max_power: f64, voltage_out: f64) -> f64 {
    max_power / voltage_out
}
