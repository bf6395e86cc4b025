//! Connector ledger — the canonical per-connector runtime state.
//!
//! Connectors form a fixed-size arena indexed 0..=N, owned by the station.
//! Index 0 is the station itself and carries station-wide reservations and
//! charging profiles. The ledger never emits protocol messages; mutators are
//! total and callers pre-validate connector ids.

use chrono::{DateTime, Utc};
use rust_ocpp::v1_6::types::{
    AvailabilityType, ChargePointStatus, ChargingProfile, ChargingProfilePurposeType, MeterValue,
};
use serde::{Deserialize, Serialize};

use super::reservation::Reservation;

/// Compare purposes without relying on derived trait impls of the wire type.
pub(crate) fn purpose_eq(a: &ChargingProfilePurposeType, b: &ChargingProfilePurposeType) -> bool {
    use ChargingProfilePurposeType::*;
    matches!(
        (a, b),
        (ChargePointMaxProfile, ChargePointMaxProfile)
            | (TxDefaultProfile, TxDefaultProfile)
            | (TxProfile, TxProfile)
    )
}

/// The transaction currently running on a connector.
#[derive(Debug, Clone)]
pub struct ActiveTransaction {
    pub transaction_id: i32,
    pub id_tag: String,
    pub started_at: DateTime<Utc>,
    /// Transaction.Begin sample, replayed in StopTransaction.transactionData.
    pub begin_meter_value: Option<MeterValue>,
}

#[derive(Debug, Clone)]
pub struct Connector {
    pub status: ChargePointStatus,
    pub availability: AvailabilityType,
    pub transaction: Option<ActiveTransaction>,
    /// Lifetime energy register, Wh.
    pub energy_register_wh: f64,
    /// Energy register since the current transaction started, Wh.
    pub transaction_register_wh: f64,
    /// Installed profiles, in insertion order.
    pub charging_profiles: Vec<ChargingProfile>,
    pub reservation: Option<Reservation>,
}

impl Connector {
    fn new() -> Self {
        Self {
            status: ChargePointStatus::Available,
            availability: AvailabilityType::Operative,
            transaction: None,
            energy_register_wh: 0.0,
            transaction_register_wh: 0.0,
            charging_profiles: Vec::new(),
            reservation: None,
        }
    }

    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn is_operative(&self) -> bool {
        matches!(self.availability, AvailabilityType::Operative)
    }

    /// Install `profile`, replacing in place any resident profile with the
    /// same `chargingProfileId` or the same `(stackLevel, purpose)` pair.
    pub fn install_profile(&mut self, profile: ChargingProfile) {
        let existing = self.charging_profiles.iter().position(|p| {
            p.charging_profile_id == profile.charging_profile_id
                || (p.stack_level == profile.stack_level
                    && purpose_eq(&p.charging_profile_purpose, &profile.charging_profile_purpose))
        });
        match existing {
            Some(index) => self.charging_profiles[index] = profile,
            None => self.charging_profiles.push(profile),
        }
    }

    /// Remove every profile matched by `filter`; true when at least one went.
    pub fn clear_profiles(&mut self, filter: &ClearProfilesFilter) -> bool {
        let before = self.charging_profiles.len();
        self.charging_profiles.retain(|p| !filter.matches(p));
        self.charging_profiles.len() != before
    }
}

/// Criteria of a `ClearChargingProfile` request.
#[derive(Debug, Default, Clone)]
pub struct ClearProfilesFilter {
    pub id: Option<i32>,
    pub purpose: Option<ChargingProfilePurposeType>,
    pub stack_level: Option<i32>,
}

impl ClearProfilesFilter {
    /// A profile is cleared iff its id equals the id filter, or it matches
    /// whichever of purpose/stackLevel are present (the absent one matching
    /// nothing when both are absent).
    fn matches(&self, profile: &ChargingProfile) -> bool {
        if self.id == Some(profile.charging_profile_id) {
            return true;
        }
        match (&self.purpose, self.stack_level) {
            (None, Some(level)) => profile.stack_level == level as u32,
            (Some(purpose), None) => purpose_eq(&profile.charging_profile_purpose, purpose),
            (Some(purpose), Some(level)) => {
                purpose_eq(&profile.charging_profile_purpose, purpose)
                    && profile.stack_level == level as u32
            }
            (None, None) => false,
        }
    }
}

/// Durable subset of a connector, written by the persistence adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorSnapshot {
    pub availability: AvailabilityType,
    pub energy_register_wh: f64,
}

/// Fixed-size arena of connectors, 0 = the station itself.
#[derive(Debug)]
pub struct ConnectorLedger {
    connectors: Vec<Connector>,
}

impl ConnectorLedger {
    /// `connector_count` physical connectors plus the station connector 0.
    pub fn new(connector_count: u32) -> Self {
        Self {
            connectors: (0..=connector_count).map(|_| Connector::new()).collect(),
        }
    }

    /// Number of physical connectors (excluding connector 0).
    pub fn connector_count(&self) -> u32 {
        (self.connectors.len() - 1) as u32
    }

    pub fn get(&self, connector_id: u32) -> Option<&Connector> {
        self.connectors.get(connector_id as usize)
    }

    pub fn get_mut(&mut self, connector_id: u32) -> Option<&mut Connector> {
        self.connectors.get_mut(connector_id as usize)
    }

    /// Physical connector ids, 1..=N.
    pub fn connector_ids(&self) -> impl Iterator<Item = u32> + '_ {
        1..=self.connector_count()
    }

    pub fn set_status(&mut self, connector_id: u32, status: ChargePointStatus) {
        if let Some(connector) = self.get_mut(connector_id) {
            connector.status = status;
        }
    }

    pub fn set_availability(&mut self, connector_id: u32, availability: AvailabilityType) {
        if let Some(connector) = self.get_mut(connector_id) {
            connector.availability = availability;
        }
    }

    /// Open a transaction; resets the transaction register.
    pub fn begin_transaction(&mut self, connector_id: u32, transaction: ActiveTransaction) {
        if let Some(connector) = self.get_mut(connector_id) {
            connector.transaction_register_wh = 0.0;
            connector.transaction = Some(transaction);
        }
    }

    /// Close the connector's transaction, returning it.
    pub fn end_transaction(&mut self, connector_id: u32) -> Option<ActiveTransaction> {
        self.get_mut(connector_id)?.transaction.take()
    }

    /// Connector currently running `transaction_id`, if any.
    pub fn connector_with_transaction(&self, transaction_id: i32) -> Option<u32> {
        self.connectors.iter().position(|c| {
            c.transaction
                .as_ref()
                .is_some_and(|t| t.transaction_id == transaction_id)
        }).map(|i| i as u32)
    }

    /// Add `delta_wh` to both energy registers. The registers only move
    /// forward while both are in a sane (non-negative) state.
    pub fn add_energy(&mut self, connector_id: u32, delta_wh: f64) {
        if let Some(connector) = self.get_mut(connector_id) {
            if connector.energy_register_wh >= 0.0 && connector.transaction_register_wh >= 0.0 {
                connector.energy_register_wh += delta_wh;
                connector.transaction_register_wh += delta_wh;
            }
        }
    }

    /// Register value backing a `MeterValues` energy sample, Wh: the
    /// transaction register of the connector running `transaction_id`, or
    /// the lifetime register of `connector_id` when no transaction is named.
    pub fn energy_register_by_transaction(
        &self,
        transaction_id: Option<i32>,
        connector_id: u32,
    ) -> f64 {
        if let Some(tx_id) = transaction_id {
            if let Some(id) = self.connector_with_transaction(tx_id) {
                return self
                    .get(id)
                    .map(|c| c.transaction_register_wh)
                    .unwrap_or(0.0);
            }
        }
        self.get(connector_id)
            .map(|c| c.energy_register_wh)
            .unwrap_or(0.0)
    }

    pub fn install_profile(&mut self, connector_id: u32, profile: ChargingProfile) {
        if let Some(connector) = self.get_mut(connector_id) {
            connector.install_profile(profile);
        }
    }

    /// Clear matching profiles on one connector, or on all when `None`.
    pub fn clear_profiles(&mut self, connector_id: Option<u32>, filter: &ClearProfilesFilter) -> bool {
        match connector_id {
            Some(id) => self
                .get_mut(id)
                .map(|c| c.clear_profiles(filter))
                .unwrap_or(false),
            None => self
                .connectors
                .iter_mut()
                .fold(false, |cleared, c| c.clear_profiles(filter) || cleared),
        }
    }

    pub fn reserve(&mut self, connector_id: u32, reservation: Reservation) {
        if let Some(connector) = self.get_mut(connector_id) {
            connector.reservation = Some(reservation);
        }
    }

    /// Drop the reservation with `reservation_id`, returning the connector
    /// that held it.
    pub fn cancel_reservation(&mut self, reservation_id: i32) -> Option<u32> {
        for (index, connector) in self.connectors.iter_mut().enumerate() {
            if connector
                .reservation
                .as_ref()
                .is_some_and(|r| r.reservation_id == reservation_id)
            {
                connector.reservation = None;
                return Some(index as u32);
            }
        }
        None
    }

    /// Evict reservations that expired by `now`; returns the connectors that
    /// were in `Reserved` and must transition back to `Available`.
    pub fn evict_expired_reservations(&mut self, now: DateTime<Utc>) -> Vec<u32> {
        let mut released = Vec::new();
        for (index, connector) in self.connectors.iter_mut().enumerate() {
            if connector.reservation.as_ref().is_some_and(|r| r.is_expired(now)) {
                connector.reservation = None;
                if matches!(connector.status, ChargePointStatus::Reserved) {
                    connector.status = ChargePointStatus::Available;
                    released.push(index as u32);
                }
            }
        }
        released
    }

    pub fn snapshots(&self) -> Vec<ConnectorSnapshot> {
        self.connectors
            .iter()
            .map(|c| ConnectorSnapshot {
                availability: c.availability.clone(),
                energy_register_wh: c.energy_register_wh,
            })
            .collect()
    }

    pub fn restore(&mut self, snapshots: &[ConnectorSnapshot]) {
        for (connector, snapshot) in self.connectors.iter_mut().zip(snapshots) {
            connector.availability = snapshot.availability.clone();
            connector.energy_register_wh = snapshot.energy_register_wh;
            if !connector.is_operative() {
                connector.status = ChargePointStatus::Unavailable;
            }
        }
    }
}
