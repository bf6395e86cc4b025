//! GetConfiguration handler

use std::sync::Arc;

use rust_ocpp::v1_6::messages::get_configuration::{
    GetConfigurationRequest, GetConfigurationResponse,
};
use rust_ocpp::v1_6::types::KeyValue;
use serde_json::Value;
use tracing::info;

use crate::station::ChargingStation;
use crate::support::errors::OcppError;

use super::{parse, respond};

pub async fn handle(station: &Arc<ChargingStation>, payload: &Value) -> Result<Value, OcppError> {
    let req: GetConfigurationRequest = parse("GetConfiguration", payload)?;
    info!(
        station_id = station.info.id.as_str(),
        keys = ?req.key,
        "GetConfiguration"
    );

    let state = station.state.lock().await;
    let (configuration_key, unknown_key) = match req.key {
        None => (
            state
                .configuration
                .keys()
                .iter()
                .map(|k| KeyValue {
                    key: k.key.clone(),
                    readonly: k.readonly,
                    value: k.value.clone(),
                })
                .collect::<Vec<_>>(),
            Vec::new(),
        ),
        Some(requested) => {
            let mut found = Vec::new();
            let mut unknown = Vec::new();
            for key in requested {
                match state.configuration.get(&key) {
                    Some(entry) => found.push(KeyValue {
                        key: entry.key.clone(),
                        readonly: entry.readonly,
                        value: entry.value.clone(),
                    }),
                    None => unknown.push(key),
                }
            }
            (found, unknown)
        }
    };

    respond(&GetConfigurationResponse {
        configuration_key: Some(configuration_key),
        unknown_key: if unknown_key.is_empty() {
            None
        } else {
            Some(unknown_key)
        },
    })
}
