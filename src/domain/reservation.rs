//! Connector reservation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reservation placed via `ReserveNow`.
///
/// A reservation on connector 0 reserves the station as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: i32,
    pub connector_id: u32,
    pub id_tag: String,
    pub parent_id_tag: Option<String>,
    pub expiry_date: DateTime<Utc>,
}

impl Reservation {
    /// A reservation whose expiry is not in the future is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Whether `id_tag` may claim this reservation at `now`.
    pub fn matches(&self, id_tag: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.id_tag == id_tag
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn reservation(expiry: DateTime<Utc>) -> Reservation {
        Reservation {
            reservation_id: 1,
            connector_id: 1,
            id_tag: "A".into(),
            parent_id_tag: None,
            expiry_date: expiry,
        }
    }

    #[test]
    fn expired_exactly_at_expiry_instant() {
        let now = Utc::now();
        assert!(reservation(now).is_expired(now));
        assert!(reservation(now - Duration::seconds(1)).is_expired(now));
        assert!(!reservation(now + Duration::seconds(1)).is_expired(now));
    }

    #[test]
    fn expired_reservation_never_matches() {
        let now = Utc::now();
        let r = reservation(now - Duration::seconds(1));
        assert!(!r.matches("A", now));
    }

    #[test]
    fn live_reservation_matches_only_its_tag() {
        let now = Utc::now();
        let r = reservation(now + Duration::hours(1));
        assert!(r.matches("A", now));
        assert!(!r.matches("B", now));
    }
}
