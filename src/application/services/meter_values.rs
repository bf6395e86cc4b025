//! Meter-value synthesizer.
//!
//! Turns sampled-value templates into protocol-accurate `MeterValue`
//! records. Emission order is fixed: SoC, aggregate voltage, per-phase
//! voltages (line-to-neutral, then optionally line-to-line), aggregate
//! power, per-phase power, aggregate current, per-phase current, energy
//! register. A measurand is omitted iff no template resolves for it.
//!
//! Randomness comes from the caller-supplied RNG; time from the caller's
//! clock. Registers live in the connector ledger and are kept in Wh.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_ocpp::v1_6::types::{
    Location, Measurand, MeterValue, Phase, ReadingContext, SampledValue, UnitOfMeasure,
};
use tracing::{error, warn};

use crate::domain::info::{ac_amperage_per_phase, dc_amperage};
use crate::domain::template::SampledValueTemplate;
use crate::domain::{ConnectorLedger, CurrentType, StationInfo, StationTemplate};
use crate::support::errors::OcppError;
use crate::support::round_to;

/// Fluctuation applied when a template does not configure its own.
pub const DEFAULT_FLUCTUATION_PERCENT: f64 = 5.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Build one `MeterValue` for `connector_id` covering `interval_ms`.
///
/// Mutates the connector's energy registers (the per-interval increment is
/// accumulated before the register sample is emitted).
#[allow(clippy::too_many_arguments)]
pub fn build_meter_value<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    ledger: &mut ConnectorLedger,
    connector_id: u32,
    transaction_id: Option<i32>,
    interval_ms: u64,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<MeterValue, OcppError> {
    let mut sampled = Vec::new();

    push_soc(info, template, connector_id, &mut sampled, rng);
    push_voltage(info, template, connector_id, &mut sampled, rng);
    push_power(info, template, connector_id, &mut sampled, rng)?;
    push_current(info, template, connector_id, &mut sampled, rng)?;
    push_energy(
        info,
        template,
        ledger,
        connector_id,
        transaction_id,
        interval_ms,
        &mut sampled,
        rng,
    )?;

    Ok(MeterValue {
        timestamp: now,
        sampled_value: sampled,
    })
}

/// Transaction.Begin sample for `StopTransaction.transactionData`.
pub fn build_transaction_begin_meter_value(
    template: &StationTemplate,
    connector_id: u32,
    meter_start_wh: f64,
    now: DateTime<Utc>,
) -> Option<MeterValue> {
    boundary_meter_value(
        template,
        connector_id,
        meter_start_wh,
        ReadingContext::TransactionBegin,
        now,
    )
}

/// Transaction.End sample for `StopTransaction.transactionData`.
pub fn build_transaction_end_meter_value(
    template: &StationTemplate,
    connector_id: u32,
    meter_stop_wh: f64,
    now: DateTime<Utc>,
) -> Option<MeterValue> {
    boundary_meter_value(
        template,
        connector_id,
        meter_stop_wh,
        ReadingContext::TransactionEnd,
        now,
    )
}

/// `[begin, end]`, in that order.
pub fn build_transaction_data_meter_values(begin: MeterValue, end: MeterValue) -> Vec<MeterValue> {
    vec![begin, end]
}

fn boundary_meter_value(
    template: &StationTemplate,
    connector_id: u32,
    register_wh: f64,
    context: ReadingContext,
    now: DateTime<Utc>,
) -> Option<MeterValue> {
    let t = template.sampled_value_template(connector_id, None, None)?;
    let unit_divider = energy_unit_divider(t);
    let value = round_to(register_wh / unit_divider, 4);
    let mut sample = sampled_value(t, value, None, t.location.clone());
    sample.context = Some(context);
    Some(MeterValue {
        timestamp: now,
        sampled_value: vec![sample],
    })
}

// ── Per-measurand synthesis ────────────────────────────────────

fn push_soc<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    connector_id: u32,
    out: &mut Vec<SampledValue>,
    rng: &mut R,
) {
    let Some(t) = template.sampled_value_template(connector_id, Some(&Measurand::SoC), None) else {
        return;
    };
    let value = custom_or_random(t, 0.0, 100.0, info, rng);
    if !(0.0..=100.0).contains(&value) {
        error!(
            station_id = info.id.as_str(),
            connector_id, value, "Synthesized SoC outside [0, 100]"
        );
    }
    let location = t.location.clone().or(Some(Location::Ev));
    out.push(sampled_value(t, value, None, location));
}

fn push_voltage<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    connector_id: u32,
    out: &mut Vec<SampledValue>,
    rng: &mut R,
) {
    let Some(t) = template.sampled_value_template(connector_id, Some(&Measurand::Voltage), None)
    else {
        return;
    };

    if info.number_of_phases == 1 || info.main_voltage_meter_values {
        let value = voltage_sample(t, info.voltage_out, info, rng);
        out.push(sampled_value(t, value, None, t.location.clone()));
    }

    if info.number_of_phases == 3 {
        for phase in [Phase::L1N, Phase::L2N, Phase::L3N] {
            let pt = phase_template(template, connector_id, &Measurand::Voltage, &phase, t);
            let value = voltage_sample(pt, info.voltage_out, info, rng);
            out.push(sampled_value(pt, value, Some(phase), pt.location.clone()));
        }
        if info.phase_line_to_line_voltage_meter_values {
            let nominal = round_to(SQRT_3 * info.voltage_out, 2);
            for phase in [Phase::L1L2, Phase::L2L3, Phase::L3L1] {
                let pt = phase_template(template, connector_id, &Measurand::Voltage, &phase, t);
                let value = voltage_sample(pt, nominal, info, rng);
                out.push(sampled_value(pt, value, Some(phase), pt.location.clone()));
            }
        }
    }
}

fn push_power<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    connector_id: u32,
    out: &mut Vec<SampledValue>,
    rng: &mut R,
) -> Result<(), OcppError> {
    let Some(t) =
        template.sampled_value_template(connector_id, Some(&Measurand::PowerActiveImport), None)
    else {
        return Ok(());
    };

    let connector_max_power = info.connector_maximum_available_power()?;
    let unit_divider = power_unit_divider(t);
    let max_power = connector_max_power / unit_divider;

    match info.current_out_type {
        CurrentType::Ac if info.number_of_phases == 3 => {
            let max_per_phase = max_power / 3.0;
            let phases = [Phase::L1, Phase::L2, Phase::L3];
            let values: Vec<f64> = phases
                .iter()
                .map(|phase| {
                    let pt =
                        phase_template(template, connector_id, &Measurand::PowerActiveImport, phase, t);
                    custom_or_random(pt, 0.0, max_per_phase, info, rng)
                })
                .collect();
            let aggregate = round_to(values.iter().sum(), 2);
            out.push(sampled_value(t, aggregate, None, t.location.clone()));
            for (phase, value) in phases.into_iter().zip(values) {
                let pt =
                    phase_template(template, connector_id, &Measurand::PowerActiveImport, &phase, t);
                out.push(sampled_value(pt, value, Some(phase), pt.location.clone()));
            }
        }
        // Single-phase AC and DC report the aggregate alone.
        CurrentType::Ac | CurrentType::Dc => {
            let value = custom_or_random(t, 0.0, max_power, info, rng);
            out.push(sampled_value(t, value, None, t.location.clone()));
        }
    }
    Ok(())
}

fn push_current<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    connector_id: u32,
    out: &mut Vec<SampledValue>,
    rng: &mut R,
) -> Result<(), OcppError> {
    let Some(t) =
        template.sampled_value_template(connector_id, Some(&Measurand::CurrentImport), None)
    else {
        return Ok(());
    };

    let connector_max_power = info.connector_maximum_available_power()?;
    match info.current_out_type {
        CurrentType::Ac if info.number_of_phases == 3 => {
            let max_amperage =
                ac_amperage_per_phase(info.number_of_phases, connector_max_power, info.voltage_out);
            let phases = [Phase::L1, Phase::L2, Phase::L3];
            let values: Vec<f64> = phases
                .iter()
                .map(|phase| {
                    let pt =
                        phase_template(template, connector_id, &Measurand::CurrentImport, phase, t);
                    custom_or_random(pt, 0.0, max_amperage, info, rng)
                })
                .collect();
            // Aggregate current is the per-phase average, not the sum.
            let aggregate = round_to(values.iter().sum::<f64>() / 3.0, 2);
            out.push(sampled_value(t, aggregate, None, t.location.clone()));
            for (phase, value) in phases.into_iter().zip(values) {
                let pt = phase_template(template, connector_id, &Measurand::CurrentImport, &phase, t);
                out.push(sampled_value(pt, value, Some(phase), pt.location.clone()));
            }
        }
        CurrentType::Ac => {
            let max_amperage = ac_amperage_per_phase(1, connector_max_power, info.voltage_out);
            let value = custom_or_random(t, 0.0, max_amperage, info, rng);
            out.push(sampled_value(t, value, None, t.location.clone()));
        }
        CurrentType::Dc => {
            let max_amperage = dc_amperage(connector_max_power, info.voltage_out);
            let value = custom_or_random(t, 0.0, max_amperage, info, rng);
            out.push(sampled_value(t, value, None, t.location.clone()));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn push_energy<R: Rng>(
    info: &StationInfo,
    template: &StationTemplate,
    ledger: &mut ConnectorLedger,
    connector_id: u32,
    transaction_id: Option<i32>,
    interval_ms: u64,
    out: &mut Vec<SampledValue>,
    rng: &mut R,
) -> Result<(), OcppError> {
    let Some(t) = template.sampled_value_template(
        connector_id,
        Some(&Measurand::EnergyActiveImportRegister),
        None,
    ) else {
        return Ok(());
    };

    let connector_max_power = info.connector_maximum_available_power()?;
    let unit_divider = energy_unit_divider(t);
    let max_energy = round_to(
        connector_max_power * interval_ms as f64 / 3_600_000.0 / unit_divider,
        2,
    );

    // Increment drawn in template units, registers kept in Wh.
    let increment = custom_or_random(t, 0.0, max_energy, info, rng);
    ledger.add_energy(connector_id, increment * unit_divider);

    let register_wh = ledger.energy_register_by_transaction(transaction_id, connector_id);
    let value = round_to(register_wh / unit_divider, 2);
    out.push(sampled_value(t, value, None, t.location.clone()));
    Ok(())
}

// ── Value generation ───────────────────────────────────────────

pub(crate) struct ClampOptions {
    pub limitation_enabled: bool,
    pub fallback: f64,
    pub unit_multiplier: f64,
}

/// Clamp a template-provided literal against `[min, max]`. Out-of-band
/// values are replaced by the fallback only when limitation is enabled;
/// otherwise they are surfaced unmodified.
pub(crate) fn clamp_custom_value(raw: f64, max: f64, min: f64, options: &ClampOptions) -> f64 {
    let value = raw * options.unit_multiplier;
    if options.limitation_enabled && !(min..=max).contains(&value) {
        warn!(
            value,
            min, max, "Custom meter value outside limits, substituting fallback"
        );
        return options.fallback;
    }
    value
}

/// Literal template value (clamped, then fluctuated) when present,
/// otherwise a uniform draw in `[minimumValue.unwrap_or(min), max]`.
fn custom_or_random<R: Rng>(
    t: &SampledValueTemplate,
    min: f64,
    max: f64,
    info: &StationInfo,
    rng: &mut R,
) -> f64 {
    match t.value.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        Some(raw) => {
            let clamped = clamp_custom_value(
                raw,
                max,
                min,
                &ClampOptions {
                    limitation_enabled: info.custom_value_limitation_meter_values,
                    fallback: max,
                    unit_multiplier: 1.0,
                },
            );
            fluctuated(clamped, fluctuation_percent(t), rng)
        }
        None => random_in(t.minimum_value.unwrap_or(min), max, rng),
    }
}

fn voltage_sample<R: Rng>(
    t: &SampledValueTemplate,
    nominal: f64,
    info: &StationInfo,
    rng: &mut R,
) -> f64 {
    match t.value.as_deref().and_then(|v| v.parse::<f64>().ok()) {
        Some(raw) => {
            let clamped = clamp_custom_value(
                raw,
                nominal,
                0.0,
                &ClampOptions {
                    limitation_enabled: info.custom_value_limitation_meter_values,
                    fallback: nominal,
                    unit_multiplier: 1.0,
                },
            );
            fluctuated(clamped, fluctuation_percent(t), rng)
        }
        None => fluctuated(nominal, fluctuation_percent(t), rng),
    }
}

fn power_unit_divider(t: &SampledValueTemplate) -> f64 {
    match t.unit {
        Some(UnitOfMeasure::Kw) => 1000.0,
        _ => 1.0,
    }
}

fn energy_unit_divider(t: &SampledValueTemplate) -> f64 {
    match t.unit {
        Some(UnitOfMeasure::KWh) => 1000.0,
        _ => 1.0,
    }
}

fn fluctuation_percent(t: &SampledValueTemplate) -> f64 {
    t.fluctuation_percent.unwrap_or(DEFAULT_FLUCTUATION_PERCENT)
}

fn fluctuated<R: Rng>(value: f64, percent: f64, rng: &mut R) -> f64 {
    if percent <= 0.0 {
        return round_to(value, 2);
    }
    let delta = rng.gen_range(-percent..=percent) / 100.0;
    round_to(value * (1.0 + delta), 2)
}

fn random_in<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    if max <= min {
        return round_to(min, 2);
    }
    round_to(rng.gen_range(min..=max), 2)
}

fn phase_template<'a>(
    template: &'a StationTemplate,
    connector_id: u32,
    measurand: &Measurand,
    phase: &Phase,
    fallback: &'a SampledValueTemplate,
) -> &'a SampledValueTemplate {
    template
        .sampled_value_template(connector_id, Some(measurand), Some(phase))
        .unwrap_or(fallback)
}

fn sampled_value(
    t: &SampledValueTemplate,
    value: f64,
    phase: Option<Phase>,
    location: Option<Location>,
) -> SampledValue {
    SampledValue {
        context: t.context.clone(),
        format: None,
        location,
        measurand: t.measurand.clone(),
        phase,
        unit: t.unit.clone(),
        value: format_value(value),
    }
}

fn format_value(value: f64) -> String {
    // shortest representation: "80", "122.67"
    let mut s = format!("{value}");
    if s == "-0" {
        s = "0".into();
    }
    s
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_ocpp::v1_6::types::ChargePointStatus;

    use crate::domain::connector::ActiveTransaction;
    use crate::domain::template::tests::template_json;
    use crate::support::errors::ErrorCode;

    use super::*;

    fn three_phase_json() -> serde_json::Value {
        let mut value = template_json();
        value["numberOfPhases"] = serde_json::json!(3);
        value["maximumPower"] = serde_json::json!(22_080);
        value["phaseLineToLineVoltageMeterValues"] = serde_json::json!(true);
        value
    }

    fn setup(value: serde_json::Value) -> (StationInfo, StationTemplate, ConnectorLedger) {
        let template: StationTemplate = serde_json::from_value(value).unwrap();
        let info = template.station_info(1);
        let ledger = ConnectorLedger::new(template.number_of_connectors);
        (info, template, ledger)
    }

    fn start_transaction(ledger: &mut ConnectorLedger, connector_id: u32, transaction_id: i32) {
        ledger.begin_transaction(
            connector_id,
            ActiveTransaction {
                transaction_id,
                id_tag: "TAG".into(),
                started_at: Utc::now(),
                begin_meter_value: None,
            },
        );
        ledger.set_status(connector_id, ChargePointStatus::Charging);
    }

    fn measurand_of(sample: &SampledValue) -> Measurand {
        sample
            .measurand
            .clone()
            .unwrap_or(Measurand::EnergyActiveImportRegister)
    }

    #[test]
    fn single_phase_energy_accumulates_within_interval_bound() {
        let (info, template, mut ledger) = setup(template_json());
        start_transaction(&mut ledger, 1, 7);
        let mut rng = StdRng::seed_from_u64(42);

        // max increment for 7360 W over 60 s is 122.67 Wh
        let max_increment = 122.67;
        let mut previous = 0.0;
        for _ in 0..2 {
            let mv = build_meter_value(
                &info, &template, &mut ledger, 1, Some(7), 60_000, &mut rng, Utc::now(),
            )
            .unwrap();
            let energy: f64 = mv
                .sampled_value
                .iter()
                .find(|s| measurand_of(s) == Measurand::EnergyActiveImportRegister)
                .unwrap()
                .value
                .parse()
                .unwrap();
            let delta = energy - previous;
            assert!(
                (0.0..=max_increment + 0.01).contains(&delta),
                "increment {delta} outside [0, {max_increment}]"
            );
            // invariant: register is monotonically non-decreasing
            assert!(energy >= previous);
            previous = energy;
        }

        let connector = ledger.get(1).unwrap();
        assert!(connector.transaction_register_wh <= connector.energy_register_wh);
    }

    #[test]
    fn three_phase_voltage_emission_order_and_line_to_line_nominal() {
        let mut value = three_phase_json();
        value["mainVoltageMeterValues"] = serde_json::json!(false);
        let (info, template, mut ledger) = setup(value);
        let mut rng = StdRng::seed_from_u64(7);

        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let voltage_phases: Vec<Option<Phase>> = mv
            .sampled_value
            .iter()
            .filter(|s| measurand_of(s) == Measurand::Voltage)
            .map(|s| s.phase.clone())
            .collect();
        assert_eq!(
            voltage_phases,
            vec![
                Some(Phase::L1N),
                Some(Phase::L2N),
                Some(Phase::L3N),
                Some(Phase::L1L2),
                Some(Phase::L2L3),
                Some(Phase::L3L1),
            ]
        );

        // line-to-line nominal: round(sqrt(3) * 230, 2) = 398.37, +/- 5%
        for sample in mv
            .sampled_value
            .iter()
            .filter(|s| matches!(s.phase, Some(Phase::L1L2) | Some(Phase::L2L3) | Some(Phase::L3L1)))
        {
            let v: f64 = sample.value.parse().unwrap();
            assert!((v - 398.37).abs() <= 398.37 * 0.05 + 0.01, "L-L voltage {v}");
            assert_eq!(v, round_to(v, 2));
        }
    }

    #[test]
    fn three_phase_power_aggregate_is_the_phase_sum() {
        let (info, template, mut ledger) = setup(three_phase_json());
        let mut rng = StdRng::seed_from_u64(3);

        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let power: Vec<&SampledValue> = mv
            .sampled_value
            .iter()
            .filter(|s| measurand_of(s) == Measurand::PowerActiveImport)
            .collect();
        assert_eq!(power.len(), 4);
        assert!(power[0].phase.is_none(), "aggregate comes first");

        let aggregate: f64 = power[0].value.parse().unwrap();
        let sum: f64 = power[1..]
            .iter()
            .map(|s| s.value.parse::<f64>().unwrap())
            .sum();
        assert!((aggregate - sum).abs() <= 0.01);

        // each phase bounded by connectorMaxPower / 3
        let max_per_phase = info.connector_maximum_available_power().unwrap() / 3.0;
        for sample in &power[1..] {
            let v: f64 = sample.value.parse().unwrap();
            assert!(v >= 0.0 && v <= max_per_phase + 0.01);
        }
    }

    #[test]
    fn three_phase_current_aggregate_is_the_phase_average() {
        let (info, template, mut ledger) = setup(three_phase_json());
        let mut rng = StdRng::seed_from_u64(11);

        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let current: Vec<&SampledValue> = mv
            .sampled_value
            .iter()
            .filter(|s| measurand_of(s) == Measurand::CurrentImport)
            .collect();
        assert_eq!(current.len(), 4);
        let aggregate: f64 = current[0].value.parse().unwrap();
        let mean: f64 = current[1..]
            .iter()
            .map(|s| s.value.parse::<f64>().unwrap())
            .sum::<f64>()
            / 3.0;
        assert!((aggregate - mean).abs() <= 0.01);
    }

    #[test]
    fn soc_stays_in_percent_range() {
        let (info, template, mut ledger) = setup(template_json());
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let mv = build_meter_value(
                &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
            )
            .unwrap();
            let soc: f64 = mv
                .sampled_value
                .iter()
                .find(|s| measurand_of(s) == Measurand::SoC)
                .unwrap()
                .value
                .parse()
                .unwrap();
            assert!((0.0..=100.0).contains(&soc));
        }
    }

    #[test]
    fn soc_defaults_location_to_ev() {
        let mut value = template_json();
        value["connectors"]["0"]["meterValues"][0] = serde_json::json!({ "measurand": "SoC" });
        let (info, template, mut ledger) = setup(value);
        let mut rng = StdRng::seed_from_u64(1);
        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let soc = mv
            .sampled_value
            .iter()
            .find(|s| measurand_of(s) == Measurand::SoC)
            .unwrap();
        assert!(matches!(soc.location, Some(Location::Ev)));
    }

    #[test]
    fn dc_station_emits_aggregate_power_and_current_only() {
        let mut value = template_json();
        value["currentOutType"] = serde_json::json!("DC");
        value["voltageOut"] = serde_json::json!(400);
        value["maximumPower"] = serde_json::json!(50_000);
        let (info, template, mut ledger) = setup(value);
        let mut rng = StdRng::seed_from_u64(5);

        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let power_count = mv
            .sampled_value
            .iter()
            .filter(|s| measurand_of(s) == Measurand::PowerActiveImport)
            .count();
        let current: Vec<&SampledValue> = mv
            .sampled_value
            .iter()
            .filter(|s| measurand_of(s) == Measurand::CurrentImport)
            .collect();
        assert_eq!(power_count, 1);
        assert_eq!(current.len(), 1);
        // DC max amperage = maxPower / voltageOut = 125 A
        let amps: f64 = current[0].value.parse().unwrap();
        assert!((0.0..=125.01).contains(&amps));
    }

    #[test]
    fn no_null_leaks_into_the_serialized_record() {
        let (info, template, mut ledger) = setup(template_json());
        let mut rng = StdRng::seed_from_u64(9);
        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap();
        let json = serde_json::to_value(&mv).unwrap();
        for sample in json["sampledValue"].as_array().unwrap() {
            for (key, value) in sample.as_object().unwrap() {
                assert!(!value.is_null(), "field {key} serialized as null");
            }
        }
    }

    #[test]
    fn zero_power_divider_surfaces_internal_error() {
        let (mut info, template, mut ledger) = setup(template_json());
        info.power_divider = 0;
        let mut rng = StdRng::seed_from_u64(2);
        let err = build_meter_value(
            &info, &template, &mut ledger, 1, None, 60_000, &mut rng, Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn custom_value_clamped_only_when_limitation_enabled() {
        let clamped = clamp_custom_value(
            250.0,
            100.0,
            0.0,
            &ClampOptions {
                limitation_enabled: true,
                fallback: 100.0,
                unit_multiplier: 1.0,
            },
        );
        assert_eq!(clamped, 100.0);

        let surfaced = clamp_custom_value(
            250.0,
            100.0,
            0.0,
            &ClampOptions {
                limitation_enabled: false,
                fallback: 100.0,
                unit_multiplier: 1.0,
            },
        );
        assert_eq!(surfaced, 250.0);
    }

    #[test]
    fn transaction_boundary_values_round_to_four_decimals() {
        let (_, template, _) = setup(template_json());
        let begin =
            build_transaction_begin_meter_value(&template, 1, 1234.56789, Utc::now()).unwrap();
        let end = build_transaction_end_meter_value(&template, 1, 2345.67891, Utc::now()).unwrap();

        assert_eq!(begin.sampled_value.len(), 1);
        assert_eq!(begin.sampled_value[0].value, "1234.5679");
        assert!(matches!(
            begin.sampled_value[0].context,
            Some(ReadingContext::TransactionBegin)
        ));
        assert!(matches!(
            end.sampled_value[0].context,
            Some(ReadingContext::TransactionEnd)
        ));

        let data = build_transaction_data_meter_values(begin, end);
        assert_eq!(data.len(), 2);
        assert!(matches!(
            data[0].sampled_value[0].context,
            Some(ReadingContext::TransactionBegin)
        ));
    }

    #[test]
    fn kwh_template_divides_the_emitted_register() {
        let mut value = template_json();
        value["connectors"]["0"]["meterValues"][4] = serde_json::json!({ "unit": "kWh" });
        let (info, template, mut ledger) = setup(value);
        ledger.add_energy(1, 5000.0); // 5 kWh on the lifetime register
        let mut rng = StdRng::seed_from_u64(13);

        let mv = build_meter_value(
            &info, &template, &mut ledger, 1, None, 0, &mut rng, Utc::now(),
        )
        .unwrap();
        let energy: f64 = mv
            .sampled_value
            .iter()
            .find(|s| measurand_of(s) == Measurand::EnergyActiveImportRegister)
            .unwrap()
            .value
            .parse()
            .unwrap();
        // interval 0 -> no increment; register reads 5.0 kWh
        assert_eq!(energy, 5.0);
    }
}
