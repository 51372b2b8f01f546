use gasflow_core::HardwareGeneration;
use gasflow_core::curve::{
    apply_flow_offset, calculate_flow_rate, convert_raw_vacuum_to_inches, flow_to_raw_counts,
    raw_flow_to_millivolts,
};
use gasflow_core::tubing::is_bad_tubing;
use gasflow_core::FlowStatus;
use proptest::prelude::*;

fn hw_strategy() -> impl Strategy<Value = HardwareGeneration> {
    prop_oneof![
        Just(HardwareGeneration::Reservoir),
        Just(HardwareGeneration::NonReservoir),
    ]
}

fn status_strategy() -> impl Strategy<Value = FlowStatus> {
    prop_oneof![
        Just(FlowStatus::TooHigh),
        Just(FlowStatus::Inaccurate),
        Just(FlowStatus::Accurate),
        Just(FlowStatus::TooLow),
    ]
}

proptest! {
    #[test]
    fn flow_is_non_decreasing_in_millivolts(
        hw in hw_strategy(),
        vacuum in 0u16..1024,
        mv in 0u16..3300,
    ) {
        let a = calculate_flow_rate(mv, vacuum, hw);
        let b = calculate_flow_rate(mv + 1, vacuum, hw);
        prop_assert!(a >= 0);
        prop_assert!(b >= a, "{hw:?} vac {vacuum}: f({mv})={a} > f({})={b}", mv + 1);
    }

    #[test]
    fn millivolts_stay_within_reference(raw in 0u16..=1023, offset in proptest::option::of(0u16..200)) {
        let mv = raw_flow_to_millivolts(raw);
        prop_assert!(mv <= 3300);
        prop_assert!(apply_flow_offset(mv, offset) <= mv);
    }

    #[test]
    fn inverse_never_undershoots(hw in hw_strategy(), vacuum in 0u16..300, ml in 0i32..1000) {
        let raw = flow_to_raw_counts(ml, vacuum, hw, None);
        let got = calculate_flow_rate(raw_flow_to_millivolts(raw), vacuum, hw);
        prop_assert!(got >= ml);
        if raw > 0 {
            let below = calculate_flow_rate(raw_flow_to_millivolts(raw - 1), vacuum, hw);
            prop_assert!(below < ml);
        }
    }

    #[test]
    fn vacuum_rounds_to_two_decimals(raw in 0u16..=1023) {
        let inches = convert_raw_vacuum_to_inches(raw);
        let exact = ((f64::from(raw) * 6.745 - 500.0) * 83.0) / 4000.0;
        prop_assert!((inches - exact).abs() <= 0.005 + 1e-9);
        prop_assert!(((inches * 100.0).round() - inches * 100.0).abs() < 1e-6);
    }

    #[test]
    fn bad_tubing_is_never_flagged_on_reservoir(
        status in status_strategy(),
        voltage in any::<u8>(),
        vacuum in -20.0f64..80.0,
    ) {
        prop_assert!(!is_bad_tubing(status, voltage, vacuum, HardwareGeneration::Reservoir));
    }
}
