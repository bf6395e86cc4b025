//! OCPP 1.6 configuration keys exposed via Get/ChangeConfiguration.

use super::info::StationInfo;
use super::template::StationTemplate;

pub const HEARTBEAT_INTERVAL: &str = "HeartbeatInterval";
pub const METER_VALUE_SAMPLE_INTERVAL: &str = "MeterValueSampleInterval";
pub const NUMBER_OF_CONNECTORS: &str = "NumberOfConnectors";
pub const SUPPORTED_FEATURE_PROFILES: &str = "SupportedFeatureProfiles";
pub const AUTHORIZE_REMOTE_TX_REQUESTS: &str = "AuthorizeRemoteTxRequests";
pub const CONNECTION_TIME_OUT: &str = "ConnectionTimeOut";

#[derive(Debug, Clone)]
pub struct ConfigurationKey {
    pub key: String,
    pub readonly: bool,
    pub value: Option<String>,
}

/// Outcome of a `ChangeConfiguration` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Accepted,
    Rejected,
    NotSupported,
}

/// Mutable per-station key store, seeded from the template at boot.
#[derive(Debug, Clone)]
pub struct OcppConfiguration {
    keys: Vec<ConfigurationKey>,
}

impl OcppConfiguration {
    pub fn from_template(template: &StationTemplate, info: &StationInfo) -> Self {
        let rw = |key: &str, value: String| ConfigurationKey {
            key: key.to_string(),
            readonly: false,
            value: Some(value),
        };
        let ro = |key: &str, value: String| ConfigurationKey {
            key: key.to_string(),
            readonly: true,
            value: Some(value),
        };
        Self {
            keys: vec![
                rw(HEARTBEAT_INTERVAL, template.heartbeat_interval.to_string()),
                rw(
                    METER_VALUE_SAMPLE_INTERVAL,
                    template.meter_value_sample_interval.to_string(),
                ),
                ro(NUMBER_OF_CONNECTORS, template.number_of_connectors.to_string()),
                ro(SUPPORTED_FEATURE_PROFILES, info.supported_feature_profiles()),
                rw(
                    AUTHORIZE_REMOTE_TX_REQUESTS,
                    template.authorize_remote_tx_requests.to_string(),
                ),
                rw(CONNECTION_TIME_OUT, "60".to_string()),
            ],
        }
    }

    pub fn keys(&self) -> &[ConfigurationKey] {
        &self.keys
    }

    pub fn get(&self, key: &str) -> Option<&ConfigurationKey> {
        self.keys.iter().find(|k| k.key == key)
    }

    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|k| k.value.as_deref())
    }

    pub fn seconds_of(&self, key: &str, default: u64) -> u64 {
        self.value_of(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn bool_of(&self, key: &str, default: bool) -> bool {
        self.value_of(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn set(&mut self, key: &str, value: &str) -> ChangeOutcome {
        match self.keys.iter_mut().find(|k| k.key == key) {
            None => ChangeOutcome::NotSupported,
            Some(entry) if entry.readonly => ChangeOutcome::Rejected,
            Some(entry) => {
                entry.value = Some(value.to_string());
                ChangeOutcome::Accepted
            }
        }
    }
}
