//! Station template — the JSON document a station boots from.
//!
//! Templates carry the station constants, the OCPP configuration seed and
//! the per-connector sampled-value templates used by the meter-value
//! synthesizer. Connector `"0"` acts as the fallback for connectors without
//! a section of their own.

use std::collections::BTreeMap;
use std::path::Path;

use rust_ocpp::v1_6::types::{Location, Measurand, Phase, ReadingContext, UnitOfMeasure};
use serde::{Deserialize, Serialize};

use crate::support::errors::SimulatorError;

use super::feature_profile::FeatureProfile;
use super::info::{station_hash_id, CurrentType, StationInfo};

/// Per-measurand synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledValueTemplate {
    /// Absent measurand defaults to `Energy.Active.Import.Register`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<Measurand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<UnitOfMeasure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReadingContext>,
    /// Literal value; when present the synthesizer clamps and fluctuates it
    /// instead of drawing a random sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluctuation_percent: Option<f64>,
}

impl SampledValueTemplate {
    pub fn measurand_or_default(&self) -> Measurand {
        self.measurand
            .clone()
            .unwrap_or(Measurand::EnergyActiveImportRegister)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorTemplate {
    #[serde(default)]
    pub meter_values: Vec<SampledValueTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTemplate {
    pub base_name: String,
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    pub current_out_type: CurrentType,
    pub voltage_out: f64,
    pub number_of_phases: u32,
    pub number_of_connectors: u32,
    /// Aggregate station power, watts.
    pub maximum_power: f64,
    /// Defaults to the connector count (power shared evenly).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_divider: Option<u32>,
    #[serde(default)]
    pub main_voltage_meter_values: bool,
    #[serde(default)]
    pub phase_line_to_line_voltage_meter_values: bool,
    #[serde(default)]
    pub custom_value_limitation_meter_values: bool,
    pub enabled_feature_profiles: Vec<FeatureProfile>,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_meter_value_sample_interval")]
    pub meter_value_sample_interval: u64,
    #[serde(default)]
    pub authorize_remote_tx_requests: bool,
    /// Keyed by connector id; `"0"` is the fallback section.
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorTemplate>,
}

fn default_heartbeat_interval() -> u64 {
    300
}

fn default_meter_value_sample_interval() -> u64 {
    60
}

impl StationTemplate {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SimulatorError::Template(format!("cannot read {}: {e}", path.display()))
        })?;
        let template: StationTemplate = serde_json::from_str(&raw).map_err(|e| {
            SimulatorError::Template(format!("cannot parse {}: {e}", path.display()))
        })?;
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.base_name.is_empty() {
            return Err(SimulatorError::Template("baseName must not be empty".into()));
        }
        if self.voltage_out <= 0.0 {
            return Err(SimulatorError::Template("voltageOut must be > 0".into()));
        }
        if !matches!(self.number_of_phases, 1 | 3) {
            return Err(SimulatorError::Template("numberOfPhases must be 1 or 3".into()));
        }
        if self.number_of_connectors == 0 {
            return Err(SimulatorError::Template("numberOfConnectors must be >= 1".into()));
        }
        if self.maximum_power <= 0.0 {
            return Err(SimulatorError::Template("maximumPower must be > 0".into()));
        }
        if self.power_divider == Some(0) {
            return Err(SimulatorError::Template("powerDivider must be > 0".into()));
        }
        Ok(())
    }

    /// Materialize the immutable station facts for fleet index `index`.
    pub fn station_info(&self, index: u32) -> StationInfo {
        let id = format!("{}-{:02}", self.base_name, index);
        StationInfo {
            hash_id: station_hash_id(&id),
            id,
            vendor: self.charge_point_vendor.clone(),
            model: self.charge_point_model.clone(),
            firmware_version: self.firmware_version.clone(),
            current_out_type: self.current_out_type,
            voltage_out: self.voltage_out,
            number_of_phases: self.number_of_phases,
            maximum_power: self.maximum_power,
            power_divider: self.power_divider.unwrap_or(self.number_of_connectors),
            main_voltage_meter_values: self.main_voltage_meter_values,
            phase_line_to_line_voltage_meter_values: self.phase_line_to_line_voltage_meter_values,
            custom_value_limitation_meter_values: self.custom_value_limitation_meter_values,
            enabled_feature_profiles: self.enabled_feature_profiles.iter().copied().collect(),
        }
    }

    fn connector_section(&self, connector_id: u32) -> Option<&ConnectorTemplate> {
        self.connectors
            .get(&connector_id.to_string())
            .or_else(|| self.connectors.get("0"))
    }

    /// Most specific template for `(measurand, phase)` on `connector_id`:
    /// exact `(measurand, phase)` match, else the phase-less `(measurand, *)`
    /// template, else — only when `measurand` is omitted — the default
    /// `Energy.Active.Import.Register` template.
    pub fn sampled_value_template(
        &self,
        connector_id: u32,
        measurand: Option<&Measurand>,
        phase: Option<&Phase>,
    ) -> Option<&SampledValueTemplate> {
        let section = self.connector_section(connector_id)?;
        let wanted = measurand
            .cloned()
            .unwrap_or(Measurand::EnergyActiveImportRegister);

        section
            .meter_values
            .iter()
            .find(|t| t.measurand_or_default() == wanted && t.phase.as_ref() == phase)
            .or_else(|| {
                section
                    .meter_values
                    .iter()
                    .find(|t| t.measurand_or_default() == wanted && t.phase.is_none())
            })
    }
}
