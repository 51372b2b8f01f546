mod common;

use std::time::Duration;

use common::{fresh_air, open, rig, rig_with, span_gas, zero_air};
use gasflow_core::mocks::SyntheticFlow;
use gasflow_core::{
    FlowStatus, HardwareGeneration, LOW_FLOW_SAMPLE_LIMIT, MAX_FLOW_RATE, MAX_VOLTAGE,
    MIN_VOLTAGE, RegulatorCfg,
};
use rstest::rstest;

const RES: HardwareGeneration = HardwareGeneration::Reservoir;
const NON_RES: HardwareGeneration = HardwareGeneration::NonReservoir;

#[test]
fn converges_to_standard_flow_and_stays_put() {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 3.0, 900));
    open(&rig, &span_gas(2), 550);
    assert_eq!(rig.path.pump_voltage(), 83);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::Accurate);
    assert!(rig.path.is_desired_flow_achieved());
    let voltage = rig.path.pump_voltage();
    assert!((178..=184).contains(&voltage), "voltage {voltage}");
    let reads = rig.probe.flow_reads();
    assert!(reads <= 20, "took {reads} reads");
    assert_eq!(rig.probe.view().voltage, voltage);
    let sample = rig.path.last_sample().unwrap();
    assert!((sample.flow_ml_per_min - 550).abs() <= 5);
    assert_eq!(check.raw_flow, sample.raw_flow_counts);

    let again = rig.regulator.check_flow(None);
    assert_eq!(again.status, FlowStatus::Accurate);
    assert_eq!(rig.probe.flow_reads(), reads + 1);
    assert_eq!(rig.path.pump_voltage(), voltage);
}

#[test]
fn too_weak_a_pump_saturates_at_max_voltage() {
    // 2.1 mL/min per volt tops out at ~535 mL/min
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 2.1, 900));
    open(&rig, &span_gas(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::TooLow);
    assert_eq!(rig.path.pump_voltage(), MAX_VOLTAGE);
    assert!(!rig.path.is_desired_flow_achieved());
    assert!(!rig.path.is_bad_pump_tubing());
}

#[test]
fn capped_flow_reports_too_low_once_voltage_is_maxed() {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 2.1, 40));
    open(&rig, &span_gas(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::TooLow);
    assert_eq!(rig.probe.view().voltage, MAX_VOLTAGE);
    // 83 up to 253 in steps of 10, clamped to 255, then one read at the rail
    assert_eq!(rig.probe.flow_reads(), 19);
}

#[test]
fn flow_above_target_at_zero_volts_is_too_high() {
    let rig = rig(RES, SyntheticFlow::constant(RES, 80, 700));
    open(&rig, &span_gas(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::TooHigh);
    assert_eq!(rig.path.pump_voltage(), MIN_VOLTAGE);
    // 83 down to 3 in steps of 10, then 0, then the saturated read
    assert_eq!(rig.probe.flow_reads(), 10);
}

#[test]
fn fresh_air_is_not_declared_empty_early() {
    let rig = rig(RES, SyntheticFlow::constant(RES, 80, 30));
    open(&rig, &fresh_air(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::TooLow);
    assert_eq!(rig.path.pump_voltage(), MAX_VOLTAGE);
    assert!(rig.probe.flow_reads() > u64::from(LOW_FLOW_SAMPLE_LIMIT));
}

#[test]
fn zero_air_is_declared_empty_after_five_low_samples() {
    let rig = rig(RES, SyntheticFlow::constant(RES, 80, 30));
    open(&rig, &zero_air(3), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::TooLow);
    assert_eq!(rig.probe.flow_reads(), u64::from(LOW_FLOW_SAMPLE_LIMIT));
    // four increments applied before the fifth sample ended the check
    assert_eq!(rig.path.pump_voltage(), 123);
}

#[test]
fn max_target_with_no_flow_is_empty_unless_fresh_air() {
    let rig = rig(RES, SyntheticFlow::constant(RES, 80, 30));
    open(&rig, &span_gas(2), MAX_FLOW_RATE);
    assert_eq!(rig.path.pump_voltage(), MAX_VOLTAGE);

    let check = rig.regulator.check_flow(Some(Duration::from_secs(3)));
    assert_eq!(check.status, FlowStatus::TooLow);
    assert_eq!(rig.probe.flow_reads(), u64::from(LOW_FLOW_SAMPLE_LIMIT));

    let fresh = common::rig(RES, SyntheticFlow::constant(RES, 80, 30));
    open(&fresh, &fresh_air(1), MAX_FLOW_RATE);
    let check = fresh.regulator.check_flow(Some(Duration::from_secs(3)));
    // runs to the timeout; the final low-flow downgrade still reports TooLow
    assert_eq!(check.status, FlowStatus::TooLow);
    assert!(fresh.probe.flow_reads() >= 10);
}

#[rstest]
#[case(900)]
#[case(600)]
fn max_target_with_real_flow_settles_inaccurate_without_a_timeout(#[case] cap: i32) {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 3.0, cap));
    open(&rig, &span_gas(2), MAX_FLOW_RATE);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::Inaccurate);
    assert_eq!(rig.path.pump_voltage(), MAX_VOLTAGE);
    // already at full voltage when opened, so the first flowing sample ends it
    assert_eq!(rig.probe.flow_reads(), 1);
    assert!(!rig.path.is_desired_flow_achieved());
}

#[test]
fn timeout_returns_last_status_without_error() {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 3.0, 900));
    open(&rig, &span_gas(2), 550);

    let check = rig.regulator.check_flow(Some(Duration::from_millis(500)));
    assert_eq!(check.status, FlowStatus::Inaccurate);
    assert_eq!(rig.probe.flow_reads(), 2);
    assert!(!rig.path.is_desired_flow_achieved());
}

#[test]
fn transient_read_failures_are_retried() {
    let rig = rig_with(
        RES,
        SyntheticFlow::linear(RES, 80, 3.0, 900),
        3,
        RegulatorCfg::default(),
    );
    open(&rig, &span_gas(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::Accurate);
}

#[test]
fn dead_sensor_gives_up_after_retry_limit() {
    let rig = rig_with(
        RES,
        SyntheticFlow::linear(RES, 80, 3.0, 900),
        1,
        RegulatorCfg {
            sensor_retry_limit: 4,
        },
    );
    open(&rig, &span_gas(1), 550);

    let check = rig.regulator.check_flow(None);
    assert_eq!(rig.probe.flow_reads(), 4);
    assert_eq!(check.raw_flow, 0);
    assert!(!rig.path.is_desired_flow_achieved());
}

#[test]
fn disabled_regulation_passes_through() {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 3.0, 900));
    open(&rig, &span_gas(1), 550);
    rig.path.set_check_flow_enabled(false);

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::Accurate);
    assert_eq!((check.raw_flow, check.raw_vacuum), (0, 0));
    assert_eq!(rig.probe.flow_reads(), 0);
    assert_eq!(rig.path.pump_voltage(), 83);
}

#[test]
fn closed_path_ends_the_check_immediately() {
    let rig = rig(RES, SyntheticFlow::linear(RES, 80, 3.0, 900));
    let ep = span_gas(1);
    open(&rig, &ep, 550);
    rig.path.close_gas_end_point(Some(&ep));

    let check = rig.regulator.check_flow(None);
    assert_eq!(check.status, FlowStatus::Accurate);
    assert_eq!(rig.probe.flow_reads(), 0);
    assert!(!rig.path.is_desired_flow_achieved());
}

#[test]
fn non_reservoir_waits_for_sensor_after_pump_start() {
    let rig = rig(NON_RES, SyntheticFlow::linear(NON_RES, 80, 3.0, 900));
    open(&rig, &span_gas(1), 550);
    assert_eq!(rig.path.pump_voltage(), 100);

    let before = rig.clock.slept();
    let check = rig.regulator.check_flow(Some(Duration::from_millis(1)));
    assert_eq!(check.status, FlowStatus::Inaccurate);
    // stabilisation plus one regulation interval
    assert_eq!(rig.clock.slept() - before, Duration::from_millis(2500));

    // only once per pump start
    let before = rig.clock.slept();
    rig.regulator.check_flow(Some(Duration::from_millis(1)));
    assert_eq!(rig.clock.slept() - before, Duration::from_millis(500));
}

#[rstest]
#[case(NON_RES, true)]
#[case(RES, false)]
fn bad_tubing_flag_follows_hardware(#[case] hw: HardwareGeneration, #[case] expected: bool) {
    // weak pump, almost no vacuum: climbs past 200 V while still inaccurate
    let rig = rig(hw, SyntheticFlow::linear(hw, 80, 2.1, 900));
    open(&rig, &span_gas(1), 550);

    let timeout = match hw {
        HardwareGeneration::NonReservoir => Duration::from_secs(8),
        HardwareGeneration::Reservoir => Duration::from_millis(3500),
    };
    let check = rig.regulator.check_flow(Some(timeout));
    assert_eq!(check.status, FlowStatus::Inaccurate);
    assert!(rig.path.pump_voltage() > 200);
    assert_eq!(rig.path.is_bad_pump_tubing(), expected);
}

#[test]
fn high_vacuum_clears_bad_tubing() {
    // same pump, but the vacuum sensor shows the cylinder is being drawn on
    let rig = rig(NON_RES, SyntheticFlow::linear(NON_RES, 150, 2.1, 900));
    open(&rig, &span_gas(1), 550);

    rig.regulator.check_flow(Some(Duration::from_secs(8)));
    assert!(rig.path.pump_voltage() > 200);
    assert!(!rig.path.is_bad_pump_tubing());
}
