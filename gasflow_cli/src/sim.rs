//! Simulated manifold wired from the `[simulator]` config table.

use gasflow_config::Config;
use gasflow_core::HardwareGeneration;
use gasflow_core::mocks::SyntheticFlow;
use gasflow_hardware::{SimReading, SimView, SimulatedManifold};

/// Linear pump model for every port; ports listed in `empty_ports` deliver
/// nothing whatever the voltage.
pub fn manifold_from_config(cfg: &Config) -> SimulatedManifold {
    let hw = HardwareGeneration::from(cfg.station.hardware);
    let s = &cfg.simulator;
    let offset = cfg.station.flow_offset_raw;
    let live = SyntheticFlow::linear(hw, s.vacuum_raw, s.ml_per_volt, s.max_flow_ml)
        .with_flow_offset(offset);
    let empty = SyntheticFlow::constant(hw, s.vacuum_raw, 0).with_flow_offset(offset);
    let empty_ports = s.empty_ports.clone();

    SimulatedManifold::new(cfg.station.num_gas_ports, move |v: &SimView| {
        let model = match v.open_port {
            Some(p) if empty_ports.contains(&p) => &empty,
            _ => &live,
        };
        SimReading {
            raw_flow: model.raw_flow(v.voltage),
            raw_vacuum: model.raw_vacuum(),
        }
    })
    .with_fail_every(s.fail_every)
}
