//! Best-effort connector-state snapshots.
//!
//! Registers and availability survive a station restart; everything else is
//! rebuilt from the template. Failures are logged and never propagate.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::connector::ConnectorSnapshot;

fn state_file(data_dir: &Path, station_id: &str) -> PathBuf {
    data_dir.join(format!("{station_id}.json"))
}

pub async fn save_connector_state(data_dir: &Path, station_id: &str, snapshots: &[ConnectorSnapshot]) {
    let path = state_file(data_dir, station_id);
    let json = match serde_json::to_vec_pretty(snapshots) {
        Ok(json) => json,
        Err(e) => {
            warn!(station_id, error = %e, "Cannot serialize connector state");
            return;
        }
    };
    if let Err(e) = tokio::fs::create_dir_all(data_dir).await {
        warn!(station_id, error = %e, "Cannot create data directory");
        return;
    }
    if let Err(e) = tokio::fs::write(&path, json).await {
        warn!(station_id, path = %path.display(), error = %e, "Cannot persist connector state");
    } else {
        debug!(station_id, path = %path.display(), "Connector state persisted");
    }
}

pub async fn load_connector_state(data_dir: &Path, station_id: &str) -> Option<Vec<ConnectorSnapshot>> {
    let path = state_file(data_dir, station_id);
    let raw = tokio::fs::read(&path).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(snapshots) => Some(snapshots),
        Err(e) => {
            warn!(station_id, path = %path.display(), error = %e, "Ignoring corrupt connector state");
            None
        }
    }
}
