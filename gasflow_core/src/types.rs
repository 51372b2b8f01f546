//! Domain types shared by the gas path, the regulator and their callers.

use std::fmt;
use std::time::Instant;

use crate::curve;

/// Manifold generation; fixed per device and resolved once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareGeneration {
    /// Reservoir-equipped manifold ("Viper", iNet DS).
    Reservoir,
    /// Direct-path manifold ("Burton", DSX).
    NonReservoir,
}

impl HardwareGeneration {
    #[inline]
    pub fn is_reservoir(self) -> bool {
        matches!(self, HardwareGeneration::Reservoir)
    }
}

/// Docked instrument family. Only used to pick the pump start voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    Mx4,
    Mx6,
    Tx1,
    Ventis,
    VentisPro,
    SafeCore,
    GbPro,
    GbPlus,
    #[default]
    Other,
}

impl DeviceType {
    /// Parse an instrument family code such as `"MX4"` or `"Ventis Pro"`.
    /// Unknown codes map to `Other`.
    pub fn from_code(code: &str) -> Self {
        let norm: String = code
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match norm.as_str() {
            "MX4" => DeviceType::Mx4,
            "MX6" => DeviceType::Mx6,
            "TX1" => DeviceType::Tx1,
            "VENTIS" => DeviceType::Ventis,
            "VENTISPRO" | "VPRO" => DeviceType::VentisPro,
            "SAFECORE" | "SC" => DeviceType::SafeCore,
            "GBPRO" => DeviceType::GbPro,
            "GBPLUS" | "GBPLS" => DeviceType::GbPlus,
            _ => DeviceType::Other,
        }
    }
}

/// Outcome of a flow check. Nominal, not ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStatus {
    TooHigh,
    Inaccurate,
    Accurate,
    TooLow,
}

impl FlowStatus {
    /// `TooLow`/`TooHigh`: the regulator ran out of voltage range or declared
    /// the cylinder empty.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowStatus::TooLow | FlowStatus::TooHigh)
    }

    pub fn name(self) -> &'static str {
        match self {
            FlowStatus::TooHigh => "TooHigh",
            FlowStatus::Inaccurate => "Inaccurate",
            FlowStatus::Accurate => "Accurate",
            FlowStatus::TooLow => "TooLow",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One converted sensor sample; derived every regulation iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    pub raw_flow_counts: u16,
    pub raw_vacuum_counts: u16,
    pub flow_millivolts: u16,
    pub flow_ml_per_min: i32,
    pub vacuum_inches: f64,
}

impl FlowSample {
    pub fn from_raw(
        raw_flow: u16,
        raw_vacuum: u16,
        flow_offset_raw: Option<u16>,
        hw: HardwareGeneration,
    ) -> Self {
        let mv = curve::apply_flow_offset(curve::raw_flow_to_millivolts(raw_flow), flow_offset_raw);
        Self {
            raw_flow_counts: raw_flow,
            raw_vacuum_counts: raw_vacuum,
            flow_millivolts: mv,
            flow_ml_per_min: curve::calculate_flow_rate(mv, raw_vacuum, hw),
            vacuum_inches: curve::convert_raw_vacuum_to_inches(raw_vacuum),
        }
    }
}

/// Result of `FlowRegulator::check_flow`: the status plus the last raw
/// readings for diagnostics (zero when no sample was taken).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowCheck {
    pub status: FlowStatus,
    pub raw_flow: u16,
    pub raw_vacuum: u16,
}

impl FlowCheck {
    /// Returned when regulation is switched off.
    pub(crate) fn passthrough() -> Self {
        Self {
            status: FlowStatus::Accurate,
            raw_flow: 0,
            raw_vacuum: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpState {
    pub running: bool,
    pub voltage: u8,
    /// Cleared whenever the pump stops.
    pub started_at: Option<Instant>,
    /// Kept until the next start; identifies a start to the regulator.
    pub last_started_at: Option<Instant>,
}

/// Part number used for the ambient-air intake port.
pub const FRESH_AIR_PART_NUMBER: &str = "FRESH AIR";
/// Oxygen band (%vol) a zero-air cylinder is filled to.
const ZERO_AIR_O2_MIN: f64 = 20.0;
const ZERO_AIR_O2_MAX: f64 = 21.8;

#[derive(Debug, Clone, PartialEq)]
pub struct GasConcentration {
    pub code: String,
    pub concentration: f64,
}

impl GasConcentration {
    pub fn new(code: impl Into<String>, concentration: f64) -> Self {
        Self {
            code: code.into(),
            concentration,
        }
    }

    fn is_oxygen(&self) -> bool {
        self.code.eq_ignore_ascii_case("O2")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cylinder {
    pub part_number: String,
    pub gases: Vec<GasConcentration>,
}

impl Cylinder {
    pub fn new(part_number: impl Into<String>, gases: Vec<GasConcentration>) -> Self {
        Self {
            part_number: part_number.into(),
            gases,
        }
    }

    pub fn fresh_air() -> Self {
        Self::new(FRESH_AIR_PART_NUMBER, Vec::new())
    }

    pub fn is_fresh_air(&self) -> bool {
        self.part_number.trim().eq_ignore_ascii_case(FRESH_AIR_PART_NUMBER)
    }

    /// Synthetic air: nothing but O2 at atmospheric concentration.
    pub fn is_zero_air(&self) -> bool {
        !self.is_fresh_air()
            && !self.gases.is_empty()
            && self.gases.iter().all(|g| {
                g.is_oxygen() && (ZERO_AIR_O2_MIN..=ZERO_AIR_O2_MAX).contains(&g.concentration)
            })
    }
}

/// A port position plus the cylinder plumbed to it.
#[derive(Debug, Clone, PartialEq)]
pub struct GasEndPoint {
    pub port: u8,
    pub cylinder: Cylinder,
}

impl GasEndPoint {
    pub fn new(port: u8, cylinder: Cylinder) -> Self {
        Self { port, cylinder }
    }
}
