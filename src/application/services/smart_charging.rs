//! Smart-charging manager: profile installation, clearing and composition
//! of stacked charging schedules into a composite schedule.

use chrono::{DateTime, Duration, Utc};
use rust_ocpp::v1_6::types::{
    ChargingProfile, ChargingProfileKindType, ChargingProfilePurposeType, ChargingSchedule,
    ChargingSchedulePeriod, RecurrencyKindType,
};

use crate::domain::connector::purpose_eq;
use crate::domain::ConnectorLedger;

/// Half-open construction, inclusive membership: the instants at both ends
/// count as inside (the composition rules of S5 depend on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Touching intervals do not overlap.
    fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Outcome of a `SetChargingProfile` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Rejected,
}

/// Validate and install `profile` on `connector_id`.
///
/// `ChargePointMaxProfile` may only live on connector 0; a `TxProfile`
/// requires a running transaction on the target connector (matching the
/// profile's transaction id when it names one).
pub fn set_charging_profile(
    ledger: &mut ConnectorLedger,
    connector_id: u32,
    profile: ChargingProfile,
) -> InstallOutcome {
    let Some(connector) = ledger.get(connector_id) else {
        return InstallOutcome::Rejected;
    };

    if purpose_eq(
        &profile.charging_profile_purpose,
        &ChargingProfilePurposeType::ChargePointMaxProfile,
    ) && connector_id != 0
    {
        return InstallOutcome::Rejected;
    }

    if purpose_eq(
        &profile.charging_profile_purpose,
        &ChargingProfilePurposeType::TxProfile,
    ) {
        let transaction_matches = connector.transaction.as_ref().is_some_and(|t| {
            profile.transaction_id.is_none() || profile.transaction_id == Some(t.transaction_id)
        });
        if !transaction_matches {
            return InstallOutcome::Rejected;
        }
    }

    ledger.install_profile(connector_id, profile);
    InstallOutcome::Accepted
}

/// Composite schedule for `connector_id` over the next `duration_secs`.
///
/// Stacks the connector's own profiles plus the station-level (connector 0)
/// profiles, highest `stackLevel` first, folding pairwise composition.
pub fn composite_schedule_for(
    ledger: &ConnectorLedger,
    connector_id: u32,
    duration_secs: i32,
    now: DateTime<Utc>,
) -> Option<ChargingSchedule> {
    let interval = Interval::new(now, now + Duration::seconds(duration_secs.max(0) as i64));

    let connector = ledger.get(connector_id)?;
    let mut profiles: Vec<&ChargingProfile> = connector.charging_profiles.iter().collect();
    if connector_id != 0 {
        if let Some(station) = ledger.get(0) {
            profiles.extend(station.charging_profiles.iter());
        }
    }
    // Stable sort: same stack level keeps insertion order.
    profiles.sort_by(|a, b| b.stack_level.cmp(&a.stack_level));

    let mut composite: Option<ChargingSchedule> = None;
    for profile in profiles {
        let schedule = effective_schedule(profile, now, &interval);
        composite = compose_charging_schedules(composite, Some(schedule), &interval);
    }
    composite
}

/// Resolve a profile's schedule to an absolute start before composition:
/// `Relative` starts now, `Recurring` rolls its start forward to the latest
/// daily/weekly occurrence not after `now`, `Absolute` is taken as-is. A
/// missing duration extends to the end of the composite interval.
pub fn effective_schedule(
    profile: &ChargingProfile,
    now: DateTime<Utc>,
    interval: &Interval,
) -> ChargingSchedule {
    let mut schedule = profile.charging_schedule.clone();

    match profile.charging_profile_kind {
        ChargingProfileKindType::Absolute => {}
        ChargingProfileKindType::Relative => schedule.start_schedule = Some(now),
        ChargingProfileKindType::Recurring => {
            if let Some(start) = schedule.start_schedule {
                let step = match profile.recurrency_kind {
                    Some(RecurrencyKindType::Weekly) => Duration::weeks(1),
                    _ => Duration::days(1),
                };
                if start <= now {
                    let elapsed = (now - start).num_seconds();
                    let steps = elapsed / step.num_seconds();
                    schedule.start_schedule = Some(start + step * steps as i32);
                }
            }
        }
    }

    if schedule.start_schedule.is_none() {
        schedule.start_schedule = Some(now);
    }
    if schedule.duration.is_none() {
        let start = schedule.start_schedule.unwrap_or(now);
        schedule.duration = Some((interval.end - start).num_seconds().max(0) as i32);
    }
    schedule
}

/// Compose two stacked schedules over `interval`; `higher` wins wherever
/// their projected footprints overlap.
pub fn compose_charging_schedules(
    higher: Option<ChargingSchedule>,
    lower: Option<ChargingSchedule>,
    interval: &Interval,
) -> Option<ChargingSchedule> {
    match (higher, lower) {
        (None, None) => None,
        (Some(h), None) => compose_charging_schedule(h, interval),
        (None, Some(l)) => compose_charging_schedule(l, interval),
        (Some(h), Some(l)) => {
            match (
                compose_charging_schedule(h, interval),
                compose_charging_schedule(l, interval),
            ) {
                (None, None) => None,
                (Some(h), None) => Some(h),
                (None, Some(l)) => Some(l),
                (Some(h), Some(l)) => Some(merge(h, l)),
            }
        }
    }
}

/// Project `schedule` onto `interval`, clipping timing only; limits and
/// per-phase counts are untouched. `None` when the footprints are disjoint.
pub fn compose_charging_schedule(
    mut schedule: ChargingSchedule,
    interval: &Interval,
) -> Option<ChargingSchedule> {
    let start = schedule.start_schedule?;
    let duration = schedule.duration?;
    let footprint = Interval::new(start, start + Duration::seconds(duration as i64));
    if !footprint.overlaps(interval) {
        return None;
    }

    schedule
        .charging_schedule_period
        .sort_by_key(|p| p.start_period);

    if footprint.start < interval.start {
        // Clip on the left. Kept periods carry their original offsets except
        // the first, which is pinned to 0 so the clipped region opens with a
        // defined limit; a period outside the interval also survives when
        // its successor is the first one inside.
        schedule.start_schedule = Some(interval.start);
        schedule.duration = Some((footprint.end - interval.start).num_seconds() as i32);

        let periods = &schedule.charging_schedule_period;
        let mut kept: Vec<ChargingSchedulePeriod> = Vec::new();
        for (index, period) in periods.iter().enumerate() {
            let instant = start + Duration::seconds(period.start_period as i64);
            let inside = interval.contains(instant);
            let successor_inside = periods.get(index + 1).is_some_and(|next| {
                interval.contains(start + Duration::seconds(next.start_period as i64))
            });
            if inside || successor_inside {
                kept.push(period.clone());
            }
        }
        if let Some(first) = kept.first_mut() {
            if first.start_period != 0 {
                first.start_period = 0;
            }
        }
        schedule.charging_schedule_period = kept;
    } else if footprint.end > interval.end {
        // Clip on the right.
        schedule.duration = Some((interval.end - footprint.start).num_seconds() as i32);
        schedule
            .charging_schedule_period
            .retain(|p| interval.contains(start + Duration::seconds(p.start_period as i64)));
    }

    Some(schedule)
}

/// Merge two projected schedules; both carry a start and a duration.
fn merge(higher: ChargingSchedule, lower: ChargingSchedule) -> ChargingSchedule {
    let h_start = higher.start_schedule.expect("projected schedule has a start");
    let l_start = lower.start_schedule.expect("projected schedule has a start");
    let h_end = h_start + Duration::seconds(higher.duration.unwrap_or(0) as i64);
    let l_end = l_start + Duration::seconds(lower.duration.unwrap_or(0) as i64);
    let h_footprint = Interval::new(h_start, h_end);
    let l_footprint = Interval::new(l_start, l_end);

    let higher_first = h_start < l_start;
    let earlier_start = h_start.min(l_start);
    let later_end = h_end.max(l_end);

    let h_offset = if higher_first {
        0
    } else {
        (h_start - l_start).num_seconds() as i32
    };
    let l_offset = if higher_first {
        (l_start - h_start).num_seconds() as i32
    } else {
        0
    };

    let mut periods: Vec<ChargingSchedulePeriod> = higher
        .charging_schedule_period
        .iter()
        .map(|p| offset_period(p, h_offset))
        .collect();

    if !h_footprint.overlaps(&l_footprint) {
        periods.extend(
            lower
                .charging_schedule_period
                .iter()
                .map(|p| offset_period(p, l_offset)),
        );
    } else {
        // The higher-priority schedule wins over its footprint: a lower
        // period survives only when its instant is outside the overlap and
        // its successor's instant does not fall back inside (which would
        // re-assert the lower limit right before the higher one takes over).
        let overlap = Interval::new(h_start.max(l_start), h_end.min(l_end));
        let lower_periods = &lower.charging_schedule_period;
        let mut kept: Vec<ChargingSchedulePeriod> = Vec::new();
        for (index, period) in lower_periods.iter().enumerate() {
            let instant = l_start + Duration::seconds(period.start_period as i64);
            let inside = overlap.contains(instant);
            let successor_inside = lower_periods.get(index + 1).is_some_and(|next| {
                overlap.contains(l_start + Duration::seconds(next.start_period as i64))
            });
            if !inside && !successor_inside {
                kept.push(period.clone());
            }
        }
        if !higher_first {
            if let Some(first) = kept.first_mut() {
                if first.start_period != 0 {
                    first.start_period = 0;
                }
            }
        }
        periods.extend(kept.iter().map(|p| offset_period(p, l_offset)));
    }

    // Stable sort keeps the higher-priority entry first among equals, so a
    // duplicate startPeriod resolves in favor of the higher schedule.
    periods.sort_by_key(|p| p.start_period);
    periods.dedup_by_key(|p| p.start_period);

    ChargingSchedule {
        duration: Some((later_end - earlier_start).num_seconds() as i32),
        start_schedule: Some(earlier_start),
        charging_rate_unit: higher.charging_rate_unit,
        charging_schedule_period: periods,
        min_charging_rate: higher.min_charging_rate.or(lower.min_charging_rate),
    }
}

fn offset_period(period: &ChargingSchedulePeriod, offset: i32) -> ChargingSchedulePeriod {
    let mut period = period.clone();
    period.start_period += offset;
    period
}
