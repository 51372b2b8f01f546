//! Raw A2D → physical unit conversion for the flow and vacuum sensors.
//!
//! The flow curves are piecewise-linear tables, one per hardware generation
//! and pressure regime. Segment `(x0, y0)-(x1, y1)` maps millivolts to
//! mL/min. Inputs past the last breakpoint extrapolate the final segment.

use crate::types::HardwareGeneration;

/// 10-bit converter full scale.
pub const ADC_FULL_SCALE: u32 = 1023;
/// Converter reference in millivolts.
pub const ADC_REFERENCE_MV: u32 = 3300;
/// Vacuum counts above which the high-pressure curve applies.
pub const HIGH_PRESSURE_VACUUM_COUNTS: u16 = 100;

type Curve = [(f64, f64)];

// Provisional breakpoints, not measured data. All four tables must be
// replaced with the production sensor calibration before driving hardware.
const RESERVOIR_LOW_PRESSURE: &Curve = &[
    (0.0, 0.0),
    (250.0, 50.0),
    (500.0, 150.0),
    (750.0, 275.0),
    (1000.0, 400.0),
    (1250.0, 525.0),
    (1500.0, 650.0),
    (1800.0, 800.0),
    (2200.0, 1000.0),
];

const RESERVOIR_HIGH_PRESSURE: &Curve = &[
    (0.0, 0.0),
    (300.0, 50.0),
    (550.0, 150.0),
    (800.0, 270.0),
    (1050.0, 390.0),
    (1300.0, 510.0),
    (1550.0, 630.0),
    (1850.0, 780.0),
    (2250.0, 980.0),
];

const NON_RESERVOIR_LOW_PRESSURE: &Curve = &[
    (0.0, 0.0),
    (200.0, 40.0),
    (450.0, 130.0),
    (700.0, 240.0),
    (950.0, 360.0),
    (1200.0, 480.0),
    (1450.0, 600.0),
    (1750.0, 760.0),
];

const NON_RESERVOIR_HIGH_PRESSURE: &Curve = &[
    (0.0, 0.0),
    (260.0, 40.0),
    (520.0, 130.0),
    (780.0, 240.0),
    (1040.0, 355.0),
    (1300.0, 470.0),
    (1560.0, 590.0),
    (1880.0, 750.0),
];

/// `raw * 3300 / 1023`, integer arithmetic.
#[inline]
pub fn raw_flow_to_millivolts(raw: u16) -> u16 {
    let mv = u32::from(raw) * ADC_REFERENCE_MV / ADC_FULL_SCALE;
    u16::try_from(mv).unwrap_or(u16::MAX)
}

/// Subtract the per-unit zero-flow baseline (given in raw counts), floored at 0.
#[inline]
pub fn apply_flow_offset(mv: u16, offset_raw: Option<u16>) -> u16 {
    mv.saturating_sub(raw_flow_to_millivolts(offset_raw.unwrap_or(0)))
}

#[inline]
fn is_high_pressure(vacuum_counts: u16) -> bool {
    vacuum_counts > HIGH_PRESSURE_VACUUM_COUNTS
}

fn curve_for(hw: HardwareGeneration, vacuum_counts: u16) -> &'static Curve {
    match (hw, is_high_pressure(vacuum_counts)) {
        (HardwareGeneration::Reservoir, false) => RESERVOIR_LOW_PRESSURE,
        (HardwareGeneration::Reservoir, true) => RESERVOIR_HIGH_PRESSURE,
        (HardwareGeneration::NonReservoir, false) => NON_RESERVOIR_LOW_PRESSURE,
        (HardwareGeneration::NonReservoir, true) => NON_RESERVOIR_HIGH_PRESSURE,
    }
}

#[inline]
fn lerp((x0, y0): (f64, f64), (x1, y1): (f64, f64), x: f64) -> f64 {
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

fn interpolate(curve: &Curve, x: f64) -> f64 {
    for seg in curve.windows(2) {
        if x <= seg[1].0 {
            return lerp(seg[0], seg[1], x);
        }
    }
    match curve {
        [.., a, b] => lerp(*a, *b, x),
        _ => 0.0,
    }
}

/// Flow in mL/min for an offset-corrected flow voltage. Floored at 0 and
/// truncated toward zero.
pub fn calculate_flow_rate(mv: u16, vacuum_counts: u16, hw: HardwareGeneration) -> i32 {
    let ml = interpolate(curve_for(hw, vacuum_counts), f64::from(mv));
    if ml <= 0.0 { 0 } else { ml as i32 }
}

/// Smallest raw flow count whose converted flow reaches `ml_per_min`,
/// saturating at full scale. Inverse of the conversion chain above; used by
/// simulators to synthesize sensor counts.
pub fn flow_to_raw_counts(
    ml_per_min: i32,
    vacuum_counts: u16,
    hw: HardwareGeneration,
    flow_offset_raw: Option<u16>,
) -> u16 {
    let full_scale = u16::try_from(ADC_FULL_SCALE).unwrap_or(u16::MAX);
    (0..=full_scale)
        .find(|&raw| {
            let mv = apply_flow_offset(raw_flow_to_millivolts(raw), flow_offset_raw);
            calculate_flow_rate(mv, vacuum_counts, hw) >= ml_per_min
        })
        .unwrap_or(full_scale)
}

/// `round(((raw * 6.745 - 500) * 83) / 4000, 2)` inches of water.
pub fn convert_raw_vacuum_to_inches(raw: u16) -> f64 {
    let inches = ((f64::from(raw) * 6.745 - 500.0) * 83.0) / 4000.0;
    (inches * 100.0).round() / 100.0
}
