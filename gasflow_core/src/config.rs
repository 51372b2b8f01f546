//! Runtime configuration for the gas path and regulator.
//!
//! These are the structs `GasPathController` consumes. They are separate from
//! the TOML-deserialized config in `gasflow_config` (see `conversions`).

use crate::types::HardwareGeneration;

/// Settle, poll and loop intervals, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// Valve-open to pump-start delay.
    pub open_settle_ms: u64,
    /// Applied twice on close: after pump stop and after valve close.
    pub close_settle_ms: u64,
    /// Flow sensor warm-up after a pump start (non-reservoir only).
    pub stabilize_ms: u64,
    pub reservoir_interval_ms: u64,
    pub non_reservoir_interval_ms: u64,
    /// Poll step while close waits for an in-flight flow check.
    pub close_wait_poll_ms: u64,
    pub close_wait_attempts: u32,
    /// How long `relieve_internal_pressure` runs the pump on port 1.
    pub relieve_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            open_settle_ms: 100,
            close_settle_ms: 500,
            stabilize_ms: 2000,
            reservoir_interval_ms: 250,
            non_reservoir_interval_ms: 500,
            close_wait_poll_ms: 100,
            close_wait_attempts: 100,
            relieve_ms: 2000,
        }
    }
}

impl TimingCfg {
    /// Regulation loop period for the given hardware.
    #[inline]
    pub fn interval_ms(&self, hw: HardwareGeneration) -> u64 {
        match hw {
            HardwareGeneration::Reservoir => self.reservoir_interval_ms,
            HardwareGeneration::NonReservoir => self.non_reservoir_interval_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegulatorCfg {
    /// Consecutive failed sensor reads tolerated inside one flow check.
    pub sensor_retry_limit: u32,
}

impl Default for RegulatorCfg {
    fn default() -> Self {
        Self {
            sensor_retry_limit: 10,
        }
    }
}
