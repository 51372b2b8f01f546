//! Degraded/kinked pump tubing heuristic.
//!
//! On non-reservoir manifolds, a pump working hard (high voltage) while the
//! vacuum sensor reads almost nothing and flow still cannot be trimmed into
//! tolerance points at collapsed tubing rather than an empty cylinder.

use crate::types::{FlowStatus, HardwareGeneration};

pub const BAD_TUBING_MIN_VOLTAGE: u8 = 200;
pub const BAD_TUBING_MAX_VACUUM_INCHES: f64 = 6.0;

/// Always false on reservoir hardware.
pub fn is_bad_tubing(
    status: FlowStatus,
    voltage: u8,
    vacuum_inches: f64,
    hw: HardwareGeneration,
) -> bool {
    hw == HardwareGeneration::NonReservoir
        && status == FlowStatus::Inaccurate
        && voltage > BAD_TUBING_MIN_VOLTAGE
        && vacuum_inches < BAD_TUBING_MAX_VACUUM_INCHES
}
