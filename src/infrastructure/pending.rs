//! Registry of outbound calls awaiting a CALLRESULT/CALLERROR.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::warn;

use crate::support::errors::RequestError;

type PendingSender = oneshot::Sender<Result<Value, RequestError>>;

/// Pending requests keyed by OCPP-J uniqueId.
#[derive(Default)]
pub struct PendingCalls {
    requests: DashMap<String, PendingSender>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `unique_id`; the returned receiver resolves with the
    /// response payload or the call failure.
    pub fn register(&self, unique_id: &str) -> oneshot::Receiver<Result<Value, RequestError>> {
        let (tx, rx) = oneshot::channel();
        self.requests.insert(unique_id.to_string(), tx);
        rx
    }

    /// Resolve a pending call. False when the id is unknown (late or
    /// duplicate response).
    pub fn complete(&self, unique_id: &str, result: Result<Value, RequestError>) -> bool {
        match self.requests.remove(unique_id) {
            Some((_, tx)) => tx.send(result).is_ok(),
            None => {
                warn!(unique_id, "Response for unknown or timed-out call");
                false
            }
        }
    }

    /// Drop a registration that will never be answered (timeout path).
    pub fn forget(&self, unique_id: &str) {
        self.requests.remove(unique_id);
    }

    /// Fail every pending call with `connection closed`.
    pub fn fail_all(&self) {
        let ids: Vec<String> = self.requests.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, tx)) = self.requests.remove(&id) {
                let _ = tx.send(Err(RequestError::ConnectionClosed));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_resolves_the_registered_receiver() {
        let pending = PendingCalls::new();
        let rx = pending.register("id-1");
        assert!(pending.complete("id-1", Ok(serde_json::json!({"status": "Accepted"}))));
        let payload = rx.await.unwrap().unwrap();
        assert_eq!(payload["status"], "Accepted");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let pending = PendingCalls::new();
        assert!(!pending.complete("ghost", Ok(Value::Null)));
    }

    #[tokio::test]
    async fn fail_all_reports_connection_closed() {
        let pending = PendingCalls::new();
        let rx1 = pending.register("a");
        let rx2 = pending.register("b");
        pending.fail_all();
        assert!(matches!(rx1.await.unwrap(), Err(RequestError::ConnectionClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(RequestError::ConnectionClosed)));
        assert_eq!(pending.len(), 0);
    }
}
