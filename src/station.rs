//! Charging-station runtime.
//!
//! One `ChargingStation` per simulated station: it owns the connector
//! ledger behind a single async mutex, drives the connector state machine
//! (remote start/stop, availability, reservations), and feeds the periodic
//! heartbeat and meter-value timers. All outbound traffic goes through the
//! injected transport; all time through the injected clock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use rand::rngs::StdRng;
use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::messages::diagnostics_status_notification::DiagnosticsStatusNotificationRequest;
use rust_ocpp::v1_6::messages::firmware_status_notification::FirmwareStatusNotificationRequest;
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::{
    AuthorizationStatus, AvailabilityStatus, AvailabilityType, ChargePointErrorCode,
    ChargePointStatus, ChargingProfile, ChargingProfilePurposeType, ChargingSchedule,
    DiagnosticsStatus, FirmwareStatus, MessageTrigger, Reason, RegistrationStatus,
    RemoteStartStopStatus, ReservationStatus, ResetRequestStatus, UnlockStatus,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::application::handlers;
use crate::application::services::meter_values::{
    build_meter_value, build_transaction_begin_meter_value, build_transaction_data_meter_values,
    build_transaction_end_meter_value,
};
use crate::application::services::smart_charging::{self, InstallOutcome};
use crate::domain::connector::purpose_eq;
use crate::domain::ocpp_config::{HEARTBEAT_INTERVAL, METER_VALUE_SAMPLE_INTERVAL};
use crate::domain::{
    ActiveTransaction, ClearProfilesFilter, ConnectorLedger, OcppConfiguration, Reservation,
    StationInfo, StationTemplate,
};
use crate::infrastructure::ws::{InboundCall, WsTransport};
use crate::infrastructure::{persistence, OcppTransport};
use crate::notifications::{EventBus, StationEvent};
use crate::support::clock::SharedClock;
use crate::support::errors::{RequestError, SimulatorError};
use crate::support::ocpp_frame::OcppFrame;
use crate::support::round_to;
use crate::support::shutdown::ShutdownSignal;

/// Mutable station state, serialized behind one mutex: no handler or timer
/// ever observes a half-applied transition.
pub struct StationState {
    pub ledger: ConnectorLedger,
    pub configuration: OcppConfiguration,
    pub rng: StdRng,
}

impl StationState {
    pub fn new(info: &StationInfo, template: &StationTemplate, rng: StdRng) -> Self {
        Self {
            ledger: ConnectorLedger::new(template.number_of_connectors),
            configuration: OcppConfiguration::from_template(template, info),
            rng,
        }
    }
}

pub struct ChargingStation {
    pub info: StationInfo,
    pub template: Arc<StationTemplate>,
    pub state: Arc<Mutex<StationState>>,
    transport: Arc<dyn OcppTransport>,
    clock: SharedClock,
    events: EventBus,
    data_dir: Option<PathBuf>,
}

impl ChargingStation {
    pub fn new(
        info: StationInfo,
        template: Arc<StationTemplate>,
        state: Arc<Mutex<StationState>>,
        transport: Arc<dyn OcppTransport>,
        clock: SharedClock,
        events: EventBus,
        data_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            info,
            template,
            state,
            transport,
            clock,
            events,
            data_dir,
        }
    }

    async fn send<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp, RequestError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_value(request)
            .map_err(|e| RequestError::SendFailed(format!("serialization failed: {e}")))?;
        let result = self.transport.call(action, payload).await?;
        serde_json::from_value(result)
            .map_err(|e| RequestError::InvalidResponse(format!("{action}: {e}")))
    }

    // ── Outbound requests ──────────────────────────────────────

    pub async fn boot_notification(&self) -> Result<BootNotificationResponse, RequestError> {
        let request = BootNotificationRequest {
            charge_point_vendor: self.info.vendor.clone(),
            charge_point_model: self.info.model.clone(),
            charge_point_serial_number: Some(self.info.hash_id.clone()),
            charge_box_serial_number: None,
            firmware_version: self.info.firmware_version.clone(),
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        };
        self.send("BootNotification", &request).await
    }

    pub async fn heartbeat(&self) {
        let response: Result<HeartbeatResponse, _> =
            self.send("Heartbeat", &HeartbeatRequest {}).await;
        match response {
            Ok(r) => debug!(
                station_id = self.info.id.as_str(),
                current_time = %r.current_time,
                "Heartbeat acknowledged"
            ),
            Err(e) => warn!(station_id = self.info.id.as_str(), error = %e, "Heartbeat failed"),
        }
    }

    pub async fn authorize(&self, id_tag: &str) -> Result<bool, RequestError> {
        let request = AuthorizeRequest {
            id_tag: id_tag.to_string(),
        };
        let response: AuthorizeResponse = self.send("Authorize", &request).await?;
        Ok(matches!(
            response.id_tag_info.status,
            AuthorizationStatus::Accepted
        ))
    }

    /// Record `status` in the ledger and push a StatusNotification.
    pub async fn notify_status(&self, connector_id: u32, status: ChargePointStatus) {
        {
            let mut state = self.state.lock().await;
            state.ledger.set_status(connector_id, status);
        }
        self.push_status_notification(connector_id).await;
    }

    /// Push a StatusNotification for the connector's current status.
    pub async fn push_status_notification(&self, connector_id: u32) {
        let status = {
            let state = self.state.lock().await;
            state.ledger.get(connector_id).map(|c| c.status.clone())
        };
        let Some(status) = status else { return };

        self.events.publish(StationEvent::Updated {
            station_id: self.info.id.clone(),
            connector_id,
            status: format!("{status:?}"),
        });

        let request = StatusNotificationRequest {
            connector_id,
            error_code: ChargePointErrorCode::NoError,
            info: None,
            status,
            timestamp: Some(self.clock.now()),
            vendor_id: None,
            vendor_error_code: None,
        };
        let response: Result<StatusNotificationResponse, _> =
            self.send("StatusNotification", &request).await;
        if let Err(e) = response {
            warn!(
                station_id = self.info.id.as_str(),
                connector_id,
                error = %e,
                "StatusNotification failed"
            );
        }
    }

    pub async fn push_all_status_notifications(&self) {
        let ids: Vec<u32> = {
            let state = self.state.lock().await;
            state.ledger.connector_ids().collect()
        };
        for id in ids {
            self.push_status_notification(id).await;
        }
    }

    // ── Session coordinator ────────────────────────────────────

    /// Remote-start flow: pick/validate the connector, move it to
    /// Preparing, optionally authorize, then run StartTransaction. The
    /// response status reflects the idTagInfo the central system returned.
    pub async fn remote_start(
        &self,
        connector_id: Option<u32>,
        id_tag: String,
        charging_profile: Option<ChargingProfile>,
    ) -> RemoteStartStopStatus {
        let now = self.clock.now();
        let released = {
            let mut state = self.state.lock().await;
            state.ledger.evict_expired_reservations(now)
        };
        for id in released {
            self.push_status_notification(id).await;
        }

        let target = {
            let state = self.state.lock().await;
            match connector_id {
                Some(id) if id >= 1 && id <= state.ledger.connector_count() => Some(id),
                Some(_) => None,
                None => state.ledger.connector_ids().find(|&id| {
                    state.ledger.get(id).is_some_and(|c| {
                        matches!(c.status, ChargePointStatus::Available) && c.is_operative()
                    })
                }),
            }
        };
        let Some(target) = target else {
            return RemoteStartStopStatus::Rejected;
        };

        let reservation_id = {
            let mut state = self.state.lock().await;
            let Some(connector) = state.ledger.get(target) else {
                return RemoteStartStopStatus::Rejected;
            };
            if !connector.is_operative() || connector.has_transaction() {
                return RemoteStartStopStatus::Rejected;
            }
            match connector.status {
                ChargePointStatus::Available | ChargePointStatus::Preparing => {}
                ChargePointStatus::Reserved => {
                    let matching = connector
                        .reservation
                        .as_ref()
                        .is_some_and(|r| r.matches(&id_tag, now));
                    if !matching {
                        return RemoteStartStopStatus::Rejected;
                    }
                }
                _ => return RemoteStartStopStatus::Rejected,
            }
            let reservation_id = connector
                .reservation
                .as_ref()
                .filter(|r| r.matches(&id_tag, now))
                .map(|r| r.reservation_id);

            if let Some(profile) = charging_profile {
                if !purpose_eq(
                    &profile.charging_profile_purpose,
                    &ChargingProfilePurposeType::TxProfile,
                ) {
                    return RemoteStartStopStatus::Rejected;
                }
                state.ledger.install_profile(target, profile);
            }
            reservation_id
        };

        self.notify_status(target, ChargePointStatus::Preparing).await;

        let authorize_first = {
            let state = self.state.lock().await;
            state
                .configuration
                .bool_of(crate::domain::ocpp_config::AUTHORIZE_REMOTE_TX_REQUESTS, false)
        };
        if authorize_first {
            match self.authorize(&id_tag).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        station_id = self.info.id.as_str(),
                        id_tag = id_tag.as_str(),
                        "Remote start not authorized"
                    );
                    self.notify_status(target, ChargePointStatus::Available).await;
                    return RemoteStartStopStatus::Rejected;
                }
                Err(e) => {
                    warn!(station_id = self.info.id.as_str(), error = %e, "Authorize failed");
                    self.notify_status(target, ChargePointStatus::Available).await;
                    return RemoteStartStopStatus::Rejected;
                }
            }
        }

        if self
            .start_transaction_on_connector(target, &id_tag, reservation_id)
            .await
        {
            RemoteStartStopStatus::Accepted
        } else {
            self.notify_status(target, ChargePointStatus::Available).await;
            RemoteStartStopStatus::Rejected
        }
    }

    /// Run StartTransaction against the central system and open the ledger
    /// transaction when it is accepted.
    pub async fn start_transaction_on_connector(
        &self,
        connector_id: u32,
        id_tag: &str,
        reservation_id: Option<i32>,
    ) -> bool {
        let now = self.clock.now();
        let (meter_start_wh, begin_meter_value) = {
            let state = self.state.lock().await;
            let register = state
                .ledger
                .get(connector_id)
                .map(|c| c.energy_register_wh)
                .unwrap_or(0.0);
            (
                register,
                build_transaction_begin_meter_value(&self.template, connector_id, register, now),
            )
        };

        let request = StartTransactionRequest {
            connector_id,
            id_tag: id_tag.to_string(),
            meter_start: round_to(meter_start_wh, 0) as i32,
            reservation_id,
            timestamp: now,
        };
        let response: StartTransactionResponse = match self.send("StartTransaction", &request).await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    station_id = self.info.id.as_str(),
                    connector_id,
                    error = %e,
                    "StartTransaction failed"
                );
                return false;
            }
        };

        if !matches!(response.id_tag_info.status, AuthorizationStatus::Accepted) {
            info!(
                station_id = self.info.id.as_str(),
                connector_id,
                status = ?response.id_tag_info.status,
                "StartTransaction not accepted"
            );
            return false;
        }

        {
            let mut state = self.state.lock().await;
            state.ledger.begin_transaction(
                connector_id,
                ActiveTransaction {
                    transaction_id: response.transaction_id,
                    id_tag: id_tag.to_string(),
                    started_at: now,
                    begin_meter_value,
                },
            );
            // A matched reservation is consumed by the transaction.
            for id in [connector_id, 0] {
                if let Some(connector) = state.ledger.get_mut(id) {
                    if connector.reservation.as_ref().is_some_and(|r| r.id_tag == id_tag) {
                        connector.reservation = None;
                    }
                }
            }
        }

        info!(
            station_id = self.info.id.as_str(),
            connector_id,
            transaction_id = response.transaction_id,
            id_tag,
            "Transaction started"
        );
        self.notify_status(connector_id, ChargePointStatus::Charging).await;
        self.persist().await;
        true
    }

    /// Remote-stop flow per the coordinator contract: Finishing, status
    /// notification, StopTransaction; Accepted iff the returned idTagInfo
    /// accepts.
    pub async fn remote_stop(&self, transaction_id: i32) -> RemoteStartStopStatus {
        let connector_id = {
            let state = self.state.lock().await;
            state.ledger.connector_with_transaction(transaction_id)
        };
        let Some(connector_id) = connector_id else {
            return RemoteStartStopStatus::Rejected;
        };

        self.notify_status(connector_id, ChargePointStatus::Finishing).await;
        if self
            .stop_transaction_on_connector(connector_id, Reason::Remote)
            .await
        {
            RemoteStartStopStatus::Accepted
        } else {
            RemoteStartStopStatus::Rejected
        }
    }

    /// Close the connector's transaction: send StopTransaction (with the
    /// Transaction.Begin/End samples as transactionData), clear the ledger
    /// entry and settle the final status from the recorded availability.
    pub async fn stop_transaction_on_connector(&self, connector_id: u32, reason: Reason) -> bool {
        let now = self.clock.now();
        let prepared = {
            let state = self.state.lock().await;
            state.ledger.get(connector_id).and_then(|connector| {
                connector
                    .transaction
                    .clone()
                    .map(|tx| (tx, connector.energy_register_wh))
            })
        };
        let Some((transaction, meter_stop_wh)) = prepared else {
            return false;
        };

        let end_meter_value =
            build_transaction_end_meter_value(&self.template, connector_id, meter_stop_wh, now);
        let transaction_data = match (transaction.begin_meter_value.clone(), end_meter_value) {
            (Some(begin), Some(end)) => Some(build_transaction_data_meter_values(begin, end)),
            _ => None,
        };

        let request = StopTransactionRequest {
            id_tag: Some(transaction.id_tag.clone()),
            meter_stop: round_to(meter_stop_wh, 0) as i32,
            timestamp: now,
            transaction_id: transaction.transaction_id,
            reason: Some(reason),
            transaction_data,
        };
        let accepted = match self
            .send::<_, StopTransactionResponse>("StopTransaction", &request)
            .await
        {
            // An omitted idTagInfo means the central system did not contest
            // the stop.
            Ok(response) => response
                .id_tag_info
                .map(|i| matches!(i.status, AuthorizationStatus::Accepted))
                .unwrap_or(true),
            Err(e) => {
                warn!(
                    station_id = self.info.id.as_str(),
                    connector_id,
                    error = %e,
                    "StopTransaction failed"
                );
                false
            }
        };

        let final_status = {
            let mut state = self.state.lock().await;
            state.ledger.end_transaction(connector_id);
            // A Scheduled availability change lands now.
            if state.ledger.get(connector_id).is_some_and(|c| c.is_operative()) {
                ChargePointStatus::Available
            } else {
                ChargePointStatus::Unavailable
            }
        };
        info!(
            station_id = self.info.id.as_str(),
            connector_id,
            transaction_id = transaction.transaction_id,
            "Transaction stopped"
        );
        self.notify_status(connector_id, final_status).await;
        self.persist().await;
        accepted
    }

    /// ChangeAvailability: availability is recorded unconditionally; the
    /// status transition is immediate on idle connectors and deferred to
    /// transaction end (`Scheduled`) on busy ones. Connector 0 fans out to
    /// every connector.
    pub async fn change_availability(
        &self,
        connector_id: u32,
        kind: AvailabilityType,
    ) -> AvailabilityStatus {
        let targets: Vec<u32> = if connector_id == 0 {
            let state = self.state.lock().await;
            std::iter::once(0).chain(state.ledger.connector_ids()).collect()
        } else {
            vec![connector_id]
        };

        let mut scheduled = false;
        let mut to_notify = Vec::new();
        {
            let mut state = self.state.lock().await;
            for &id in &targets {
                state.ledger.set_availability(id, kind.clone());
                if id == 0 {
                    continue;
                }
                let Some(connector) = state.ledger.get(id) else { continue };
                if connector.has_transaction() {
                    scheduled = true;
                    continue;
                }
                let new_status = match kind {
                    AvailabilityType::Operative => ChargePointStatus::Available,
                    AvailabilityType::Inoperative => ChargePointStatus::Unavailable,
                };
                if std::mem::discriminant(&connector.status) != std::mem::discriminant(&new_status) {
                    state.ledger.set_status(id, new_status);
                    to_notify.push(id);
                }
            }
        }
        for id in to_notify {
            self.push_status_notification(id).await;
        }
        self.persist().await;

        if scheduled {
            AvailabilityStatus::Scheduled
        } else {
            AvailabilityStatus::Accepted
        }
    }

    // ── Reservations ───────────────────────────────────────────

    pub async fn reserve_now(&self, reservation: Reservation) -> ReservationStatus {
        let now = self.clock.now();
        let released = {
            let mut state = self.state.lock().await;
            state.ledger.evict_expired_reservations(now)
        };
        for id in released {
            self.push_status_notification(id).await;
        }

        let connector_id = reservation.connector_id;
        let mut notifications = Vec::new();
        let status = {
            let mut state = self.state.lock().await;

            // Re-using a reservationId moves the reservation.
            if let Some(previous) = state.ledger.cancel_reservation(reservation.reservation_id) {
                if previous != connector_id
                    && state
                        .ledger
                        .get(previous)
                        .is_some_and(|c| matches!(c.status, ChargePointStatus::Reserved))
                {
                    state.ledger.set_status(previous, ChargePointStatus::Available);
                    notifications.push(previous);
                }
            }

            let Some(connector) = state.ledger.get(connector_id) else {
                return ReservationStatus::Rejected;
            };
            let current = connector.status.clone();
            let already_reserved = connector.reservation.is_some();

            if connector_id == 0 {
                // Station-level reservation; connector 0 carries no status.
                state.ledger.reserve(0, reservation);
                ReservationStatus::Accepted
            } else {
                match current {
                    ChargePointStatus::Available if !already_reserved => {
                        state.ledger.reserve(connector_id, reservation);
                        state
                            .ledger
                            .set_status(connector_id, ChargePointStatus::Reserved);
                        notifications.push(connector_id);
                        ReservationStatus::Accepted
                    }
                    ChargePointStatus::Faulted => ReservationStatus::Faulted,
                    ChargePointStatus::Unavailable => ReservationStatus::Unavailable,
                    _ => ReservationStatus::Occupied,
                }
            }
        };
        for id in notifications {
            self.push_status_notification(id).await;
        }
        status
    }

    pub async fn cancel_reservation(&self, reservation_id: i32) -> bool {
        let released = {
            let mut state = self.state.lock().await;
            let Some(connector_id) = state.ledger.cancel_reservation(reservation_id) else {
                return false;
            };
            if state
                .ledger
                .get(connector_id)
                .is_some_and(|c| matches!(c.status, ChargePointStatus::Reserved))
            {
                state.ledger.set_status(connector_id, ChargePointStatus::Available);
                Some(connector_id)
            } else {
                None
            }
        };
        if let Some(id) = released {
            self.push_status_notification(id).await;
        }
        true
    }

    /// True iff a live reservation for `id_tag` sits on the connector (which
    /// must be in Reserved) or on the station-level connector 0. Expired
    /// reservations never match.
    pub async fn has_reservation(&self, connector_id: u32, id_tag: &str) -> bool {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let connector_match = state.ledger.get(connector_id).is_some_and(|c| {
            matches!(c.status, ChargePointStatus::Reserved)
                && c.reservation.as_ref().is_some_and(|r| r.matches(id_tag, now))
        });
        let station_match = state
            .ledger
            .get(0)
            .is_some_and(|c| c.reservation.as_ref().is_some_and(|r| r.matches(id_tag, now)));
        connector_match || station_match
    }

    // ── Smart charging ─────────────────────────────────────────

    pub async fn set_charging_profile(
        &self,
        connector_id: u32,
        profile: ChargingProfile,
    ) -> InstallOutcome {
        let mut state = self.state.lock().await;
        smart_charging::set_charging_profile(&mut state.ledger, connector_id, profile)
    }

    pub async fn clear_charging_profiles(
        &self,
        connector_id: Option<u32>,
        filter: &ClearProfilesFilter,
    ) -> bool {
        let mut state = self.state.lock().await;
        state.ledger.clear_profiles(connector_id, filter)
    }

    pub async fn composite_schedule(
        &self,
        connector_id: u32,
        duration_secs: i32,
    ) -> Option<ChargingSchedule> {
        let state = self.state.lock().await;
        smart_charging::composite_schedule_for(
            &state.ledger,
            connector_id,
            duration_secs,
            self.clock.now(),
        )
    }

    // ── Meter values ───────────────────────────────────────────

    /// Synthesize and push MeterValues for every charging connector.
    pub async fn emit_meter_values(&self, interval_ms: u64) {
        let charging: Vec<(u32, i32)> = {
            let state = self.state.lock().await;
            state
                .ledger
                .connector_ids()
                .filter_map(|id| {
                    state
                        .ledger
                        .get(id)
                        .and_then(|c| c.transaction.as_ref())
                        .map(|t| (id, t.transaction_id))
                })
                .collect()
        };
        for (connector_id, transaction_id) in charging {
            self.send_meter_values(connector_id, Some(transaction_id), interval_ms)
                .await;
        }
    }

    async fn send_meter_values(
        &self,
        connector_id: u32,
        transaction_id: Option<i32>,
        interval_ms: u64,
    ) {
        let now = self.clock.now();
        let built = {
            let mut state = self.state.lock().await;
            let StationState { ledger, rng, .. } = &mut *state;
            build_meter_value(
                &self.info,
                &self.template,
                ledger,
                connector_id,
                transaction_id,
                interval_ms,
                rng,
                now,
            )
        };
        match built {
            Ok(meter_value) => {
                let request = MeterValuesRequest {
                    connector_id,
                    transaction_id,
                    meter_value: vec![meter_value],
                };
                let response: Result<MeterValuesResponse, _> =
                    self.send("MeterValues", &request).await;
                if let Err(e) = response {
                    warn!(
                        station_id = self.info.id.as_str(),
                        connector_id,
                        error = %e,
                        "MeterValues push failed"
                    );
                }
            }
            Err(e) => {
                error!(
                    station_id = self.info.id.as_str(),
                    connector_id,
                    error = %e,
                    "Meter-value synthesis failed"
                );
            }
        }
    }

    // ── Triggered messages / reset ─────────────────────────────

    pub async fn execute_trigger(&self, trigger: MessageTrigger, connector_id: Option<u32>) {
        match trigger {
            MessageTrigger::BootNotification => {
                if let Err(e) = self.boot_notification().await {
                    warn!(station_id = self.info.id.as_str(), error = %e, "Triggered BootNotification failed");
                }
            }
            MessageTrigger::Heartbeat => self.heartbeat().await,
            MessageTrigger::StatusNotification => match connector_id {
                Some(id) => self.push_status_notification(id).await,
                None => self.push_all_status_notifications().await,
            },
            MessageTrigger::MeterValues => {
                let interval_ms = {
                    let state = self.state.lock().await;
                    state
                        .configuration
                        .seconds_of(METER_VALUE_SAMPLE_INTERVAL, 60)
                        * 1000
                };
                let targets: Vec<(u32, Option<i32>)> = {
                    let state = self.state.lock().await;
                    state
                        .ledger
                        .connector_ids()
                        .filter(|&id| connector_id.is_none() || connector_id == Some(id))
                        .map(|id| {
                            (
                                id,
                                state
                                    .ledger
                                    .get(id)
                                    .and_then(|c| c.transaction.as_ref())
                                    .map(|t| t.transaction_id),
                            )
                        })
                        .collect()
                };
                for (id, tx) in targets {
                    self.send_meter_values(id, tx, interval_ms).await;
                }
            }
            MessageTrigger::DiagnosticsStatusNotification => {
                let request = DiagnosticsStatusNotificationRequest {
                    status: DiagnosticsStatus::Idle,
                };
                let response: Result<serde_json::Value, _> =
                    self.send("DiagnosticsStatusNotification", &request).await;
                if let Err(e) = response {
                    warn!(station_id = self.info.id.as_str(), error = %e, "DiagnosticsStatusNotification failed");
                }
            }
            MessageTrigger::FirmwareStatusNotification => {
                let request = FirmwareStatusNotificationRequest {
                    status: FirmwareStatus::Idle,
                };
                let response: Result<serde_json::Value, _> =
                    self.send("FirmwareStatusNotification", &request).await;
                if let Err(e) = response {
                    warn!(station_id = self.info.id.as_str(), error = %e, "FirmwareStatusNotification failed");
                }
            }
        }
    }

    /// Stop running transactions and re-announce the station.
    pub async fn reset(&self, kind: ResetRequestStatus) {
        let reason = match kind {
            ResetRequestStatus::Hard => Reason::HardReset,
            ResetRequestStatus::Soft => Reason::SoftReset,
        };
        let charging: Vec<u32> = {
            let state = self.state.lock().await;
            state
                .ledger
                .connector_ids()
                .filter(|&id| state.ledger.get(id).is_some_and(|c| c.has_transaction()))
                .collect()
        };
        for id in charging {
            self.stop_transaction_on_connector(id, reason.clone()).await;
        }
        info!(station_id = self.info.id.as_str(), ?kind, "Reset: re-announcing station");
        if let Err(e) = self.boot_notification().await {
            warn!(station_id = self.info.id.as_str(), error = %e, "Re-boot announcement failed");
        }
        self.push_all_status_notifications().await;
    }

    pub async fn unlock_connector(&self, connector_id: u32) -> UnlockStatus {
        if connector_id == 0 {
            return UnlockStatus::NotSupported;
        }
        let (exists, has_transaction) = {
            let state = self.state.lock().await;
            match state.ledger.get(connector_id) {
                Some(c) => (true, c.has_transaction()),
                None => (false, false),
            }
        };
        if !exists {
            return UnlockStatus::UnlockFailed;
        }
        if has_transaction {
            self.stop_transaction_on_connector(connector_id, Reason::UnlockCommand)
                .await;
        }
        UnlockStatus::Unlocked
    }

    // ── Session plumbing ───────────────────────────────────────

    /// Boot until accepted, then announce every connector. The accepted
    /// interval overrides the heartbeat configuration key.
    pub async fn announce(&self) -> Result<(), RequestError> {
        loop {
            let response = self.boot_notification().await?;
            match response.status {
                RegistrationStatus::Accepted => {
                    if response.interval > 0 {
                        let mut state = self.state.lock().await;
                        state
                            .configuration
                            .set(HEARTBEAT_INTERVAL, &response.interval.to_string());
                    }
                    break;
                }
                other => {
                    info!(
                        station_id = self.info.id.as_str(),
                        status = ?other,
                        retry_in = response.interval,
                        "Boot not accepted yet"
                    );
                    tokio::time::sleep(StdDuration::from_secs((response.interval.max(1)) as u64))
                        .await;
                }
            }
        }
        self.events.publish(StationEvent::Started {
            station_id: self.info.id.clone(),
            hash_id: self.info.hash_id.clone(),
        });
        self.push_all_status_notifications().await;
        Ok(())
    }

    /// Answer one inbound CALL.
    pub async fn process_call(self: &Arc<Self>, call: InboundCall) {
        info!(
            station_id = self.info.id.as_str(),
            action = call.action.as_str(),
            "Command received"
        );
        let frame = match handlers::dispatch(self, &call.action, &call.payload).await {
            Ok(payload) => OcppFrame::result(&call.unique_id, payload),
            Err(e) => {
                warn!(
                    station_id = self.info.id.as_str(),
                    action = call.action.as_str(),
                    error = %e,
                    "Command rejected"
                );
                OcppFrame::error(&call.unique_id, &e)
            }
        };
        if let Err(e) = self.transport.respond(frame).await {
            error!(station_id = self.info.id.as_str(), error = %e, "Failed to send response");
        }
    }

    async fn persist(&self) {
        let Some(dir) = self.data_dir.clone() else { return };
        let snapshots = {
            let state = self.state.lock().await;
            state.ledger.snapshots()
        };
        let station_id = self.info.id.clone();
        tokio::spawn(async move {
            persistence::save_connector_state(&dir, &station_id, &snapshots).await;
        });
    }
}

// ── Station task ───────────────────────────────────────────────

/// Launcher-facing knobs for one station task.
#[derive(Debug, Clone)]
pub struct StationRuntime {
    pub supervision_url: String,
    pub request_timeout: StdDuration,
    pub data_dir: Option<PathBuf>,
}

/// Run one station: connect, announce, serve commands and timers, and
/// reconnect with capped backoff until shutdown. Connector registers and
/// availability survive reconnects (and restarts, via the snapshots).
pub async fn run_station(
    info: StationInfo,
    template: Arc<StationTemplate>,
    runtime: StationRuntime,
    events: EventBus,
    clock: SharedClock,
    rng: StdRng,
    mut shutdown: ShutdownSignal,
) -> Result<(), SimulatorError> {
    let mut state = StationState::new(&info, &template, rng);
    if let Some(dir) = &runtime.data_dir {
        if let Some(snapshots) = persistence::load_connector_state(dir, &info.id).await {
            state.ledger.restore(&snapshots);
            info!(station_id = info.id.as_str(), "Restored connector state");
        }
    }
    let state = Arc::new(Mutex::new(state));

    let mut backoff_secs = 1u64;
    while !shutdown.is_shutdown() {
        match WsTransport::connect(&runtime.supervision_url, &info.id, runtime.request_timeout)
            .await
        {
            Ok((transport, calls)) => {
                backoff_secs = 1;
                let station = Arc::new(ChargingStation::new(
                    info.clone(),
                    template.clone(),
                    state.clone(),
                    Arc::new(transport),
                    clock.clone(),
                    events.clone(),
                    runtime.data_dir.clone(),
                ));
                if let Err(e) = station.announce().await {
                    warn!(station_id = info.id.as_str(), error = %e, "Announcement failed");
                } else {
                    run_session(station, calls, shutdown.clone()).await;
                }
            }
            Err(e) => {
                warn!(station_id = info.id.as_str(), error = %e, "Connection failed");
            }
        }
        if shutdown.is_shutdown() {
            break;
        }
        debug!(station_id = info.id.as_str(), backoff_secs, "Reconnecting");
        tokio::select! {
            _ = tokio::time::sleep(StdDuration::from_secs(backoff_secs)) => {}
            _ = shutdown.wait() => break,
        }
        backoff_secs = (backoff_secs * 2).min(60);
    }

    events.publish(StationEvent::Stopped {
        station_id: info.id.clone(),
    });
    info!(station_id = info.id.as_str(), "Station stopped");
    Ok(())
}

/// Serve one connection: inbound commands plus the heartbeat and
/// meter-value timers. Interval keys are re-read every cycle so
/// ChangeConfiguration takes effect without a restart.
pub async fn run_session(
    station: Arc<ChargingStation>,
    mut calls: mpsc::Receiver<InboundCall>,
    mut shutdown: ShutdownSignal,
) {
    use tokio::time::{sleep_until, Instant};

    let (mut heartbeat_secs, mut meter_secs) = intervals(&station).await;
    let mut next_heartbeat = Instant::now() + StdDuration::from_secs(heartbeat_secs);
    let mut next_meter = Instant::now() + StdDuration::from_secs(meter_secs);

    loop {
        tokio::select! {
            maybe_call = calls.recv() => match maybe_call {
                Some(call) => station.process_call(call).await,
                None => {
                    info!(station_id = station.info.id.as_str(), "Connection closed by peer");
                    break;
                }
            },
            _ = sleep_until(next_heartbeat) => {
                station.heartbeat().await;
                (heartbeat_secs, meter_secs) = intervals(&station).await;
                next_heartbeat = Instant::now() + StdDuration::from_secs(heartbeat_secs);
            }
            _ = sleep_until(next_meter) => {
                station.emit_meter_values(meter_secs * 1000).await;
                (heartbeat_secs, meter_secs) = intervals(&station).await;
                next_meter = Instant::now() + StdDuration::from_secs(meter_secs);
            }
            _ = shutdown.wait() => {
                info!(station_id = station.info.id.as_str(), "Shutting down session");
                break;
            }
        }
    }
}

async fn intervals(station: &ChargingStation) -> (u64, u64) {
    let state = station.state.lock().await;
    (
        state.configuration.seconds_of(HEARTBEAT_INTERVAL, 300).max(1),
        state
            .configuration
            .seconds_of(METER_VALUE_SAMPLE_INTERVAL, 60)
            .max(1),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    use chrono::Duration;
    use rand::SeedableRng;
    use serde_json::json;

    use crate::domain::template::tests::template_json;
    use crate::support::clock::testing::ManualClock;
    use crate::support::clock::Clock;

    use super::*;

    struct MockTransport {
        responses: StdMutex<HashMap<String, VecDeque<serde_json::Value>>>,
        calls: StdMutex<Vec<(String, serde_json::Value)>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(HashMap::new()),
                calls: StdMutex::new(Vec::new()),
            })
        }

        fn enqueue(&self, action: &str, payload: serde_json::Value) {
            self.responses
                .lock()
                .unwrap()
                .entry(action.to_string())
                .or_default()
                .push_back(payload);
        }

        fn actions(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
        }

        fn calls_of(&self, action: &str) -> Vec<serde_json::Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| a == action)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl OcppTransport for MockTransport {
        async fn call(
            &self,
            action: &str,
            payload: serde_json::Value,
        ) -> Result<serde_json::Value, RequestError> {
            self.calls
                .lock()
                .unwrap()
                .push((action.to_string(), payload));
            if let Some(queued) = self
                .responses
                .lock()
                .unwrap()
                .get_mut(action)
                .and_then(|q| q.pop_front())
            {
                return Ok(queued);
            }
            match action {
                "StatusNotification" | "MeterValues" | "DiagnosticsStatusNotification"
                | "FirmwareStatusNotification" => Ok(json!({})),
                "Heartbeat" => Ok(json!({ "currentTime": "2024-06-01T12:00:00Z" })),
                _ => Err(RequestError::Timeout),
            }
        }

        async fn respond(&self, _frame: OcppFrame) -> Result<(), RequestError> {
            Ok(())
        }
    }

    fn test_station(
        transport: Arc<MockTransport>,
        clock: SharedClock,
    ) -> Arc<ChargingStation> {
        let template: StationTemplate = serde_json::from_value(template_json()).unwrap();
        let template = Arc::new(template);
        let info = template.station_info(1);
        let state = Arc::new(Mutex::new(StationState::new(
            &info,
            &template,
            StdRng::seed_from_u64(7),
        )));
        Arc::new(ChargingStation::new(
            info,
            template,
            state,
            transport,
            clock,
            EventBus::new(),
            None,
        ))
    }

    fn accepted_start(transaction_id: i32) -> serde_json::Value {
        json!({ "transactionId": transaction_id, "idTagInfo": { "status": "Accepted" } })
    }

    #[tokio::test]
    async fn remote_start_opens_a_transaction() {
        let transport = MockTransport::new();
        transport.enqueue("StartTransaction", accepted_start(101));
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let status = station.remote_start(Some(1), "TAG-A".into(), None).await;
        assert!(matches!(status, RemoteStartStopStatus::Accepted));

        let state = station.state.lock().await;
        let connector = state.ledger.get(1).unwrap();
        assert!(matches!(connector.status, ChargePointStatus::Charging));
        let tx = connector.transaction.as_ref().unwrap();
        assert_eq!(tx.transaction_id, 101);
        assert_eq!(tx.id_tag, "TAG-A");

        // Preparing before StartTransaction, Charging after.
        let actions = transport.actions();
        let start_at = actions.iter().position(|a| a == "StartTransaction").unwrap();
        assert_eq!(actions[start_at - 1], "StatusNotification");
        assert_eq!(actions[start_at + 1], "StatusNotification");
        let statuses = transport.calls_of("StatusNotification");
        assert_eq!(statuses[0]["status"], "Preparing");
        assert_eq!(statuses[1]["status"], "Charging");
    }

    #[tokio::test]
    async fn remote_start_rejected_when_not_authorized() {
        let transport = MockTransport::new();
        transport.enqueue(
            "StartTransaction",
            json!({ "transactionId": 0, "idTagInfo": { "status": "Invalid" } }),
        );
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let status = station.remote_start(Some(1), "BAD".into(), None).await;
        assert!(matches!(status, RemoteStartStopStatus::Rejected));

        let state = station.state.lock().await;
        let connector = state.ledger.get(1).unwrap();
        assert!(connector.transaction.is_none());
        assert!(matches!(connector.status, ChargePointStatus::Available));
    }

    #[tokio::test]
    async fn remote_start_rejected_on_unknown_connector() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());
        let status = station.remote_start(Some(9), "TAG".into(), None).await;
        assert!(matches!(status, RemoteStartStopStatus::Rejected));
        assert!(transport.calls_of("StartTransaction").is_empty());
    }

    #[tokio::test]
    async fn remote_stop_finishes_and_reports_transaction_data() {
        let transport = MockTransport::new();
        transport.enqueue("StartTransaction", accepted_start(55));
        transport.enqueue("StopTransaction", json!({ "idTagInfo": { "status": "Accepted" } }));
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station.remote_start(Some(1), "TAG".into(), None).await;
        station.emit_meter_values(60_000).await;

        let status = station.remote_stop(55).await;
        assert!(matches!(status, RemoteStartStopStatus::Accepted));

        {
            let state = station.state.lock().await;
            let connector = state.ledger.get(1).unwrap();
            assert!(connector.transaction.is_none());
            assert!(matches!(connector.status, ChargePointStatus::Available));
        }

        let stops = transport.calls_of("StopTransaction");
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0]["transactionId"], 55);
        assert_eq!(stops[0]["reason"], "Remote");
        let data = stops[0]["transactionData"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["sampledValue"][0]["context"], "Transaction.Begin");
        assert_eq!(data[1]["sampledValue"][0]["context"], "Transaction.End");

        // Finishing was announced before the stop request went out.
        let statuses = transport.calls_of("StatusNotification");
        let finishing = statuses.iter().any(|s| s["status"] == "Finishing");
        assert!(finishing);
    }

    #[tokio::test]
    async fn remote_stop_without_transaction_is_rejected() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());
        let status = station.remote_stop(999).await;
        assert!(matches!(status, RemoteStartStopStatus::Rejected));
    }

    #[tokio::test]
    async fn change_availability_on_busy_connector_is_scheduled() {
        let transport = MockTransport::new();
        transport.enqueue("StartTransaction", accepted_start(7));
        transport.enqueue("StopTransaction", json!({}));
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station.remote_start(Some(1), "TAG".into(), None).await;
        let status = station
            .change_availability(1, AvailabilityType::Inoperative)
            .await;
        assert!(matches!(status, AvailabilityStatus::Scheduled));
        {
            let state = station.state.lock().await;
            let connector = state.ledger.get(1).unwrap();
            // availability recorded immediately, status change deferred
            assert!(!connector.is_operative());
            assert!(matches!(connector.status, ChargePointStatus::Charging));
        }

        // the deferred transition lands at transaction end
        station.stop_transaction_on_connector(1, Reason::Local).await;
        let state = station.state.lock().await;
        let connector = state.ledger.get(1).unwrap();
        assert!(matches!(connector.status, ChargePointStatus::Unavailable));
    }

    #[tokio::test]
    async fn change_availability_on_idle_connector_is_immediate() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let status = station
            .change_availability(0, AvailabilityType::Inoperative)
            .await;
        assert!(matches!(status, AvailabilityStatus::Accepted));
        let state = station.state.lock().await;
        assert!(!state.ledger.get(0).unwrap().is_operative());
        assert!(matches!(
            state.ledger.get(1).unwrap().status,
            ChargePointStatus::Unavailable
        ));
    }

    #[tokio::test]
    async fn reservation_lifecycle_and_expiry() {
        let transport = MockTransport::new();
        let manual = Arc::new(ManualClock::starting_at(
            chrono::Utc::now(),
        ));
        let clock: SharedClock = manual.clone();
        let station = test_station(transport.clone(), clock.clone());

        let status = station
            .reserve_now(Reservation {
                reservation_id: 5,
                connector_id: 1,
                id_tag: "A".into(),
                parent_id_tag: None,
                expiry_date: clock.now() + Duration::seconds(100),
            })
            .await;
        assert!(matches!(status, ReservationStatus::Accepted));
        assert!(station.has_reservation(1, "A").await);
        assert!(!station.has_reservation(1, "B").await);
        {
            let state = station.state.lock().await;
            assert!(matches!(
                state.ledger.get(1).unwrap().status,
                ChargePointStatus::Reserved
            ));
        }

        // a second reservation on the reserved connector is Occupied
        let occupied = station
            .reserve_now(Reservation {
                reservation_id: 6,
                connector_id: 1,
                id_tag: "B".into(),
                parent_id_tag: None,
                expiry_date: clock.now() + Duration::seconds(100),
            })
            .await;
        assert!(matches!(occupied, ReservationStatus::Occupied));

        // expired reservations never match, and the next coordinator pass
        // clears them
        manual.advance(Duration::seconds(200));
        assert!(!station.has_reservation(1, "A").await);

        let after_expiry = station
            .reserve_now(Reservation {
                reservation_id: 7,
                connector_id: 1,
                id_tag: "C".into(),
                parent_id_tag: None,
                expiry_date: clock.now() + Duration::seconds(100),
            })
            .await;
        assert!(matches!(after_expiry, ReservationStatus::Accepted));
        let state = station.state.lock().await;
        let reservation = state.ledger.get(1).unwrap().reservation.as_ref().unwrap();
        assert_eq!(reservation.reservation_id, 7);
    }

    #[tokio::test]
    async fn station_level_reservation_matches_any_connector() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let status = station
            .reserve_now(Reservation {
                reservation_id: 9,
                connector_id: 0,
                id_tag: "FLEET".into(),
                parent_id_tag: None,
                expiry_date: chrono::Utc::now() + Duration::hours(1),
            })
            .await;
        assert!(matches!(status, ReservationStatus::Accepted));
        assert!(station.has_reservation(1, "FLEET").await);
        // connector 1 keeps its Available status
        let state = station.state.lock().await;
        assert!(matches!(
            state.ledger.get(1).unwrap().status,
            ChargePointStatus::Available
        ));
    }

    #[tokio::test]
    async fn cancel_reservation_releases_the_connector() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station
            .reserve_now(Reservation {
                reservation_id: 12,
                connector_id: 1,
                id_tag: "A".into(),
                parent_id_tag: None,
                expiry_date: chrono::Utc::now() + Duration::hours(1),
            })
            .await;
        assert!(station.cancel_reservation(12).await);
        assert!(!station.cancel_reservation(12).await);

        let state = station.state.lock().await;
        let connector = state.ledger.get(1).unwrap();
        assert!(connector.reservation.is_none());
        assert!(matches!(connector.status, ChargePointStatus::Available));
    }

    #[tokio::test]
    async fn reserved_connector_accepts_only_the_holder() {
        let transport = MockTransport::new();
        transport.enqueue("StartTransaction", accepted_start(21));
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station
            .reserve_now(Reservation {
                reservation_id: 30,
                connector_id: 1,
                id_tag: "HOLDER".into(),
                parent_id_tag: None,
                expiry_date: chrono::Utc::now() + Duration::hours(1),
            })
            .await;

        let other = station.remote_start(Some(1), "OTHER".into(), None).await;
        assert!(matches!(other, RemoteStartStopStatus::Rejected));

        let holder = station.remote_start(Some(1), "HOLDER".into(), None).await;
        assert!(matches!(holder, RemoteStartStopStatus::Accepted));

        // the consumed reservation id was reported in StartTransaction
        let starts = transport.calls_of("StartTransaction");
        assert_eq!(starts[0]["reservationId"], 30);
        let state = station.state.lock().await;
        assert!(state.ledger.get(1).unwrap().reservation.is_none());
    }

    #[tokio::test]
    async fn unlock_stops_a_running_transaction() {
        let transport = MockTransport::new();
        transport.enqueue("StartTransaction", accepted_start(77));
        transport.enqueue("StopTransaction", json!({}));
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station.remote_start(Some(1), "TAG".into(), None).await;
        let status = station.unlock_connector(1).await;
        assert!(matches!(status, UnlockStatus::Unlocked));

        let stops = transport.calls_of("StopTransaction");
        assert_eq!(stops[0]["reason"], "UnlockCommand");

        assert!(matches!(
            station.unlock_connector(0).await,
            UnlockStatus::NotSupported
        ));
        assert!(matches!(
            station.unlock_connector(9).await,
            UnlockStatus::UnlockFailed
        ));
    }

    #[tokio::test]
    async fn announce_retries_until_accepted_and_applies_the_interval() {
        let transport = MockTransport::new();
        transport.enqueue(
            "BootNotification",
            json!({ "status": "Pending", "currentTime": "2024-06-01T12:00:00Z", "interval": 1 }),
        );
        transport.enqueue(
            "BootNotification",
            json!({ "status": "Accepted", "currentTime": "2024-06-01T12:00:01Z", "interval": 120 }),
        );
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station.announce().await.unwrap();

        assert_eq!(transport.calls_of("BootNotification").len(), 2);
        let state = station.state.lock().await;
        assert_eq!(state.configuration.seconds_of(HEARTBEAT_INTERVAL, 0), 120);
    }

    #[tokio::test]
    async fn dispatch_gates_unknown_and_disabled_actions() {
        use crate::support::errors::ErrorCode;

        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let err = handlers::dispatch(&station, "FancyNewAction", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotImplemented);

        let err = handlers::dispatch(&station, "RemoteStopTransaction", &json!({ "bogus": true }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FormationViolation);

        // station without the Reservation profile
        let mut value = template_json();
        value["enabledFeatureProfiles"] = json!(["Core", "SmartCharging"]);
        let template: StationTemplate = serde_json::from_value(value).unwrap();
        let template = Arc::new(template);
        let info = template.station_info(1);
        let state = Arc::new(Mutex::new(StationState::new(
            &info,
            &template,
            StdRng::seed_from_u64(7),
        )));
        let gated = Arc::new(ChargingStation::new(
            info,
            template,
            state,
            transport.clone(),
            crate::support::clock::system_clock(),
            EventBus::new(),
            None,
        ));
        let err = handlers::dispatch(
            &gated,
            "ReserveNow",
            &json!({
                "connectorId": 1,
                "expiryDate": "2030-01-01T00:00:00Z",
                "idTag": "A",
                "reservationId": 1
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotSupported);
        // the gate has no side effects
        let state = gated.state.lock().await;
        assert!(state.ledger.get(1).unwrap().reservation.is_none());
    }

    #[tokio::test]
    async fn dispatch_smart_charging_round_trip() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        let profile = |id: i32| {
            json!({
                "connectorId": 1,
                "csChargingProfiles": {
                    "chargingProfileId": id,
                    "stackLevel": 2,
                    "chargingProfilePurpose": "TxDefaultProfile",
                    "chargingProfileKind": "Relative",
                    "chargingSchedule": {
                        "duration": 600,
                        "chargingRateUnit": "A",
                        "chargingSchedulePeriod": [ { "startPeriod": 0, "limit": 16.0 } ]
                    }
                }
            })
        };

        let response = handlers::dispatch(&station, "SetChargingProfile", &profile(1))
            .await
            .unwrap();
        assert_eq!(response["status"], "Accepted");

        // same (stackLevel, purpose) replaces in place
        handlers::dispatch(&station, "SetChargingProfile", &profile(2))
            .await
            .unwrap();
        {
            let state = station.state.lock().await;
            let profiles = &state.ledger.get(1).unwrap().charging_profiles;
            assert_eq!(profiles.len(), 1);
            assert_eq!(profiles[0].charging_profile_id, 2);
        }

        let composite = handlers::dispatch(
            &station,
            "GetCompositeSchedule",
            &json!({ "connectorId": 1, "duration": 600 }),
        )
        .await
        .unwrap();
        assert_eq!(composite["status"], "Accepted");
        assert!(composite["chargingSchedule"]["chargingSchedulePeriod"]
            .as_array()
            .is_some());

        let cleared = handlers::dispatch(
            &station,
            "ClearChargingProfile",
            &json!({ "chargingProfilePurpose": "TxDefaultProfile" }),
        )
        .await
        .unwrap();
        assert_eq!(cleared["status"], "Accepted");

        // idempotent: a second clear matches nothing
        let cleared_again = handlers::dispatch(
            &station,
            "ClearChargingProfile",
            &json!({ "chargingProfilePurpose": "TxDefaultProfile" }),
        )
        .await
        .unwrap();
        assert_eq!(cleared_again["status"], "Unknown");
    }

    #[tokio::test]
    async fn meter_values_only_flow_for_charging_connectors() {
        let transport = MockTransport::new();
        let station = test_station(transport.clone(), crate::support::clock::system_clock());

        station.emit_meter_values(60_000).await;
        assert!(transport.calls_of("MeterValues").is_empty());

        transport.enqueue("StartTransaction", accepted_start(3));
        station.remote_start(Some(1), "TAG".into(), None).await;
        station.emit_meter_values(60_000).await;

        let pushes = transport.calls_of("MeterValues");
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0]["connectorId"], 1);
        assert_eq!(pushes[0]["transactionId"], 3);
        assert!(!pushes[0]["meterValue"][0]["sampledValue"]
            .as_array()
            .unwrap()
            .is_empty());
    }
}
