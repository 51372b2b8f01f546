//! `From` implementations bridging `gasflow_config` types to `gasflow_core` types.

use crate::config::{RegulatorCfg, TimingCfg};
use crate::types::{Cylinder, DeviceType, GasConcentration, GasEndPoint, HardwareGeneration};

// ── HardwareGeneration ───────────────────────────────────────────────────────

impl From<gasflow_config::Hardware> for HardwareGeneration {
    fn from(h: gasflow_config::Hardware) -> Self {
        match h {
            gasflow_config::Hardware::Reservoir => HardwareGeneration::Reservoir,
            gasflow_config::Hardware::NonReservoir => HardwareGeneration::NonReservoir,
        }
    }
}

// ── DeviceType ───────────────────────────────────────────────────────────────

impl From<&gasflow_config::Station> for DeviceType {
    fn from(s: &gasflow_config::Station) -> Self {
        s.device_type
            .as_deref()
            .map(DeviceType::from_code)
            .unwrap_or_default()
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&gasflow_config::Timing> for TimingCfg {
    fn from(c: &gasflow_config::Timing) -> Self {
        Self {
            open_settle_ms: c.open_settle_ms,
            close_settle_ms: c.close_settle_ms,
            stabilize_ms: c.stabilize_ms,
            reservoir_interval_ms: c.reservoir_interval_ms,
            non_reservoir_interval_ms: c.non_reservoir_interval_ms,
            close_wait_poll_ms: c.close_wait_poll_ms,
            close_wait_attempts: c.close_wait_attempts,
            relieve_ms: c.relieve_ms,
        }
    }
}

// ── RegulatorCfg ─────────────────────────────────────────────────────────────

impl From<&gasflow_config::Regulator> for RegulatorCfg {
    fn from(c: &gasflow_config::Regulator) -> Self {
        Self {
            sensor_retry_limit: c.sensor_retry_limit,
        }
    }
}

// ── GasEndPoint ──────────────────────────────────────────────────────────────

impl From<&gasflow_config::PortCfg> for GasEndPoint {
    fn from(p: &gasflow_config::PortCfg) -> Self {
        let gases = p
            .gases
            .iter()
            .map(|g| GasConcentration::new(g.code.clone(), g.concentration))
            .collect();
        GasEndPoint::new(p.position, Cylinder::new(p.part_number.clone(), gases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_config_maps_to_core_types() {
        let cfg = gasflow_config::load_toml(
            r#"
[station]
hardware = "burton"
num_gas_ports = 3
device_type = "ventis pro"

[timing]
stabilize_ms = 10

[[ports]]
position = 2
part_number = "1810-0000"
gases = [{ code = "O2", concentration = 20.9 }]
"#,
        )
        .unwrap();
        assert_eq!(
            HardwareGeneration::from(cfg.station.hardware),
            HardwareGeneration::NonReservoir
        );
        assert_eq!(DeviceType::from(&cfg.station), DeviceType::VentisPro);
        let timing = TimingCfg::from(&cfg.timing);
        assert_eq!(timing.stabilize_ms, 10);
        assert_eq!(timing.close_settle_ms, 500);
        let ep = GasEndPoint::from(&cfg.ports[0]);
        assert_eq!(ep.port, 2);
        assert!(ep.cylinder.is_zero_air());
    }
}
