use gasflow_hardware::{PortCall, RecordingPort, SimReading, SimView, SimulatedManifold};
use gasflow_traits::HardwarePort;
use rstest::rstest;

fn sim() -> SimulatedManifold {
    SimulatedManifold::new(4, |v: &SimView| SimReading {
        raw_flow: u16::from(v.voltage),
        raw_vacuum: 120,
    })
}

#[rstest]
fn records_commands_in_issue_order() {
    let mut port = RecordingPort::new(sim());
    let log = port.log();

    port.set_solenoid_state(2, true);
    port.set_pump_voltage(90).unwrap();
    port.set_pump_state(true);
    let _ = port.read_raw_flow(false).unwrap();
    let _ = port.read_raw_vacuum().unwrap();
    port.set_pump_state(false);
    port.set_solenoid_state(2, false);

    assert_eq!(
        log.commands(),
        vec![
            PortCall::Solenoid { port: 2, open: true },
            PortCall::PumpVoltage(90),
            PortCall::PumpState(true),
            PortCall::PumpState(false),
            PortCall::Solenoid { port: 2, open: false },
        ]
    );
    assert_eq!(log.calls().len(), 7);
}

#[rstest]
#[case(1, 60)]
#[case(4, 200)]
fn passes_readings_through(#[case] port_id: u8, #[case] voltage: u8) {
    let mut port = RecordingPort::new(sim());
    port.set_solenoid_state(port_id, true);
    port.set_pump_voltage(voltage).unwrap();
    port.set_pump_state(true);
    assert_eq!(port.read_raw_flow(true).unwrap(), u16::from(voltage));
    assert_eq!(port.read_raw_vacuum().unwrap(), 120);
    assert!(port.pump_state());
    assert_eq!(port.pump_voltage(), voltage);
}

#[rstest]
fn clear_resets_the_log() {
    let mut port = RecordingPort::new(sim());
    let log = port.log();
    port.set_pump_state(true);
    assert_eq!(log.position(|c| *c == PortCall::PumpState(true)), Some(0));
    log.clear();
    assert!(log.calls().is_empty());
}
