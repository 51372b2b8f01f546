//! Type-state builder for `GasPathController`.
//!
//! A hardware port is required at compile time: `try_build()` only exists
//! once `with_port()` was called. `build()` additionally needs the hardware
//! generation. Everything else is checked at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use gasflow_traits::HardwarePort;
use gasflow_traits::clock::{Clock, MonotonicClock};

use crate::config::{RegulatorCfg, TimingCfg};
use crate::error::{BuildError, Result};
use crate::gas_path::GasPathController;
use crate::types::{DeviceType, HardwareGeneration};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `GasPathController`. `P` is the port type once one is set.
pub struct GasPathBuilder<P, H> {
    port: P,
    hardware: Option<HardwareGeneration>,
    device_type: DeviceType,
    num_gas_ports: Option<u8>,
    flow_offset_raw: Option<u16>,
    timing: TimingCfg,
    regulator: RegulatorCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _h: PhantomData<H>,
}

impl Default for GasPathBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            port: Missing,
            hardware: None,
            device_type: DeviceType::Other,
            num_gas_ports: None,
            flow_offset_raw: None,
            timing: TimingCfg::default(),
            regulator: RegulatorCfg::default(),
            clock: None,
            _h: PhantomData,
        }
    }
}

impl GasPathBuilder<Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

fn validate(
    num_gas_ports: Option<u8>,
    timing: &TimingCfg,
    regulator: &RegulatorCfg,
) -> std::result::Result<u8, BuildError> {
    let ports = num_gas_ports.unwrap_or(0);
    if ports == 0 || ports > gasflow_config::MAX_GAS_PORTS {
        return Err(BuildError::InvalidConfig("num_gas_ports must be in [1, 12]"));
    }
    if timing.reservoir_interval_ms == 0 || timing.non_reservoir_interval_ms == 0 {
        return Err(BuildError::InvalidConfig("regulation interval must be > 0"));
    }
    if timing.close_wait_poll_ms == 0 {
        return Err(BuildError::InvalidConfig("close_wait_poll_ms must be > 0"));
    }
    if regulator.sensor_retry_limit == 0 {
        return Err(BuildError::InvalidConfig("sensor_retry_limit must be >= 1"));
    }
    Ok(ports)
}

impl<P, H> GasPathBuilder<P, H> {
    pub fn with_gas_ports(mut self, n: u8) -> Self {
        self.num_gas_ports = Some(n);
        self
    }

    pub fn with_device_type(mut self, device: DeviceType) -> Self {
        self.device_type = device;
        self
    }

    /// Zero-flow baseline of the flow sensor, in raw counts.
    pub fn with_flow_offset(mut self, offset_raw: Option<u16>) -> Self {
        self.flow_offset_raw = offset_raw;
        self
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_regulator(mut self, regulator: RegulatorCfg) -> Self {
        self.regulator = regulator;
        self
    }

    /// Inject a clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Provide the hardware port (required).
    pub fn with_port<Q: HardwarePort>(self, port: Q) -> GasPathBuilder<Q, H> {
        GasPathBuilder {
            port,
            hardware: self.hardware,
            device_type: self.device_type,
            num_gas_ports: self.num_gas_ports,
            flow_offset_raw: self.flow_offset_raw,
            timing: self.timing,
            regulator: self.regulator,
            clock: self.clock,
            _h: PhantomData,
        }
    }

    /// Provide the manifold generation (required).
    pub fn with_hardware(self, hw: HardwareGeneration) -> GasPathBuilder<P, Set> {
        GasPathBuilder {
            port: self.port,
            hardware: Some(hw),
            device_type: self.device_type,
            num_gas_ports: self.num_gas_ports,
            flow_offset_raw: self.flow_offset_raw,
            timing: self.timing,
            regulator: self.regulator,
            clock: self.clock,
            _h: PhantomData,
        }
    }

    /// Apply a loaded station config: generation, ports, device, offset,
    /// timing and regulator settings.
    pub fn with_config(self, cfg: &gasflow_config::Config) -> GasPathBuilder<P, Set> {
        self.with_hardware(cfg.station.hardware.into())
            .with_gas_ports(cfg.station.num_gas_ports)
            .with_device_type(DeviceType::from(&cfg.station))
            .with_flow_offset(cfg.station.flow_offset_raw)
            .with_timing(TimingCfg::from(&cfg.timing))
            .with_regulator(RegulatorCfg::from(&cfg.regulator))
    }
}

impl<P: HardwarePort, H> GasPathBuilder<P, H> {
    /// Build with runtime checks; errors are `BuildError` inside the report.
    pub fn try_build(self) -> Result<GasPathController<P>> {
        let hardware = self
            .hardware
            .ok_or_else(|| eyre::Report::new(BuildError::MissingHardware))?;
        let num_gas_ports =
            validate(self.num_gas_ports, &self.timing, &self.regulator).map_err(eyre::Report::new)?;
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        Ok(GasPathController::from_parts(
            self.port,
            hardware,
            self.device_type,
            num_gas_ports,
            self.flow_offset_raw,
            self.timing,
            self.regulator,
            clock,
        ))
    }
}

impl<P: HardwarePort> GasPathBuilder<P, Set> {
    pub fn build(self) -> Result<GasPathController<P>> {
        self.try_build()
    }
}
