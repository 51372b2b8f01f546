//! Call-trace wrapper around any `HardwarePort`.
//!
//! Used to check open/close ordering (valve before pump on open, pump before
//! valve on close) and by the CLI self-check.
use std::sync::{Arc, Mutex};

use gasflow_traits::{HardwarePort, PortError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCall {
    PumpState(bool),
    PumpVoltage(u8),
    Solenoid { port: u8, open: bool },
    ReadFlow,
    ReadVacuum,
}

impl PortCall {
    /// True for calls that change pump or valve state.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            PortCall::PumpState(_) | PortCall::PumpVoltage(_) | PortCall::Solenoid { .. }
        )
    }
}

/// Shared, cloneable view of the recorded calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<PortCall>>>);

impl CallLog {
    fn push(&self, call: PortCall) {
        if let Ok(mut v) = self.0.lock() {
            v.push(call);
        }
    }

    pub fn calls(&self) -> Vec<PortCall> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Recorded pump/valve commands, sensor reads filtered out.
    pub fn commands(&self) -> Vec<PortCall> {
        self.calls().into_iter().filter(PortCall::is_command).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.0.lock() {
            v.clear();
        }
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&PortCall) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }
}

pub struct RecordingPort<P> {
    inner: P,
    log: CallLog,
}

impl<P> RecordingPort<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            log: CallLog::default(),
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: HardwarePort> HardwarePort for RecordingPort<P> {
    fn set_pump_state(&mut self, on: bool) {
        self.log.push(PortCall::PumpState(on));
        self.inner.set_pump_state(on);
    }

    fn pump_state(&self) -> bool {
        self.inner.pump_state()
    }

    fn set_pump_voltage(&mut self, voltage: u8) -> Result<(), PortError> {
        self.log.push(PortCall::PumpVoltage(voltage));
        self.inner.set_pump_voltage(voltage)
    }

    fn pump_voltage(&self) -> u8 {
        self.inner.pump_voltage()
    }

    fn set_solenoid_state(&mut self, port: u8, open: bool) {
        self.log.push(PortCall::Solenoid { port, open });
        self.inner.set_solenoid_state(port, open);
    }

    fn read_raw_flow(&mut self, reservoir: bool) -> Result<u16, PortError> {
        self.log.push(PortCall::ReadFlow);
        self.inner.read_raw_flow(reservoir)
    }

    fn read_raw_vacuum(&mut self) -> Result<u16, PortError> {
        self.log.push(PortCall::ReadVacuum);
        self.inner.read_raw_vacuum()
    }
}
