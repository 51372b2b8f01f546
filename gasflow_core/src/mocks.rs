//! Synthetic flow curves for simulators and tests.

use crate::curve;
use crate::types::HardwareGeneration;

/// Flow as a function of pump voltage, turned back into the raw sensor
/// counts the regulator would read on `hw`.
pub struct SyntheticFlow {
    hw: HardwareGeneration,
    vacuum_raw: u16,
    flow_offset_raw: Option<u16>,
    flow: Box<dyn Fn(u8) -> i32 + Send + Sync>,
}

impl SyntheticFlow {
    pub fn new(
        hw: HardwareGeneration,
        vacuum_raw: u16,
        flow: impl Fn(u8) -> i32 + Send + Sync + 'static,
    ) -> Self {
        Self {
            hw,
            vacuum_raw,
            flow_offset_raw: None,
            flow: Box::new(flow),
        }
    }

    /// `ml_per_volt * voltage` mL/min, capped at `max_ml`.
    pub fn linear(hw: HardwareGeneration, vacuum_raw: u16, ml_per_volt: f64, max_ml: i32) -> Self {
        Self::new(hw, vacuum_raw, move |v| {
            let ml = (f64::from(v) * ml_per_volt) as i32;
            ml.min(max_ml)
        })
    }

    /// Same flow whatever the voltage.
    pub fn constant(hw: HardwareGeneration, vacuum_raw: u16, ml: i32) -> Self {
        Self::new(hw, vacuum_raw, move |_| ml)
    }

    /// Counts must be produced against the same offset the controller uses.
    pub fn with_flow_offset(mut self, offset_raw: Option<u16>) -> Self {
        self.flow_offset_raw = offset_raw;
        self
    }

    pub fn flow_ml(&self, voltage: u8) -> i32 {
        (self.flow)(voltage)
    }

    pub fn raw_flow(&self, voltage: u8) -> u16 {
        curve::flow_to_raw_counts(self.flow_ml(voltage), self.vacuum_raw, self.hw, self.flow_offset_raw)
    }

    pub fn raw_vacuum(&self) -> u16 {
        self.vacuum_raw
    }
}
