#![allow(dead_code)]

use std::sync::Arc;

use gasflow_core::mocks::SyntheticFlow;
use gasflow_core::{
    Cylinder, DeviceType, FlowRegulator, GasConcentration, GasEndPoint, GasPathBuilder,
    GasPathController, HardwareGeneration, RegulatorCfg, TimingCfg,
};
use gasflow_hardware::{SimProbe, SimReading, SimView, SimulatedManifold};
use gasflow_traits::clock::test_clock::TestClock;

pub struct Rig {
    pub path: Arc<GasPathController<SimulatedManifold>>,
    pub regulator: FlowRegulator<SimulatedManifold>,
    pub probe: SimProbe,
    pub clock: TestClock,
}

pub fn manifold(model: SyntheticFlow, fail_every: u64) -> SimulatedManifold {
    SimulatedManifold::new(3, move |v: &SimView| SimReading {
        raw_flow: model.raw_flow(v.voltage),
        raw_vacuum: model.raw_vacuum(),
    })
    .with_fail_every(fail_every)
}

pub fn rig(hw: HardwareGeneration, model: SyntheticFlow) -> Rig {
    rig_with(hw, model, 0, RegulatorCfg::default())
}

pub fn rig_with(
    hw: HardwareGeneration,
    model: SyntheticFlow,
    fail_every: u64,
    regulator: RegulatorCfg,
) -> Rig {
    let clock = TestClock::new();
    let sim = manifold(model, fail_every);
    let probe = sim.probe();
    let path = GasPathBuilder::new()
        .with_port(sim)
        .with_hardware(hw)
        .with_gas_ports(3)
        .with_device_type(DeviceType::Mx4)
        .with_timing(TimingCfg::default())
        .with_regulator(regulator)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let path = Arc::new(path);
    Rig {
        regulator: FlowRegulator::new(path.clone()),
        path,
        probe,
        clock,
    }
}

pub fn span_gas(port: u8) -> GasEndPoint {
    GasEndPoint::new(
        port,
        Cylinder::new(
            "1810-4023",
            vec![
                GasConcentration::new("CO", 100.0),
                GasConcentration::new("H2S", 25.0),
                GasConcentration::new("O2", 19.0),
            ],
        ),
    )
}

pub fn zero_air(port: u8) -> GasEndPoint {
    GasEndPoint::new(
        port,
        Cylinder::new("1810-0000", vec![GasConcentration::new("O2", 20.9)]),
    )
}

pub fn fresh_air(port: u8) -> GasEndPoint {
    GasEndPoint::new(port, Cylinder::fresh_air())
}

/// Set the target and open `ep`.
pub fn open(rig: &Rig, ep: &GasEndPoint, desired: i32) {
    rig.path.set_desired_flow(desired).unwrap();
    rig.path.open_gas_end_point(ep).unwrap();
}
