#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the docking-station gas path.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Only `[station]` is mandatory; every other table has working defaults.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Highest port count any manifold variant ships with.
pub const MAX_GAS_PORTS: u8 = 12;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Hardware {
    /// Reservoir-equipped manifold (Viper / iNet DS).
    #[serde(alias = "viper")]
    Reservoir,
    /// Direct-path manifold (Burton / DSX).
    #[serde(alias = "burton", alias = "nonreservoir")]
    NonReservoir,
}

#[derive(Debug, Deserialize)]
pub struct Station {
    pub hardware: Hardware,
    pub num_gas_ports: u8,
    /// Docked instrument family code, e.g. "MX4"; selects the start voltage.
    #[serde(default)]
    pub device_type: Option<String>,
    /// Zero-flow baseline of the flow sensor in raw A2D counts.
    #[serde(default)]
    pub flow_offset_raw: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub open_settle_ms: u64,
    pub close_settle_ms: u64,
    /// Flow sensor warm-up after a pump start (non-reservoir only)
    pub stabilize_ms: u64,
    pub reservoir_interval_ms: u64,
    pub non_reservoir_interval_ms: u64,
    pub close_wait_poll_ms: u64,
    pub close_wait_attempts: u32,
    pub relieve_ms: u64,
}

impl Default for Timing {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Regulator {
    /// Consecutive failed sensor reads tolerated inside one flow check
    pub sensor_retry_limit: u32,
}

impl Default for Regulator {
    fn default() -> Self {
        Self {
            sensor_retry_limit: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Parameters of the simulated manifold used when no driver is linked.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulator {
    /// Delivered mL/min per pump voltage step
    pub ml_per_volt: f64,
    /// Flow ceiling of the simulated cylinder/regulator (mL/min)
    pub max_flow_ml: i32,
    /// Constant vacuum sensor reading (raw counts)
    pub vacuum_raw: u16,
    /// Inject a transient flow-read fault every N reads (0 disables)
    pub fail_every: u64,
    /// Ports whose cylinders are simulated as empty
    pub empty_ports: Vec<u8>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            ml_per_volt: 3.0,
            max_flow_ml: 900,
            vacuum_raw: 80,
            fail_every: 0,
            empty_ports: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GasCfg {
    pub code: String,
    /// Concentration; %vol for O2, ppm for toxics
    pub concentration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortCfg {
    pub position: u8,
    pub part_number: String,
    #[serde(default)]
    pub gases: Vec<GasCfg>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub station: Station,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub regulator: Regulator,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulator: Simulator,
    /// Cylinders currently installed, one entry per occupied port
    #[serde(default)]
    pub ports: Vec<PortCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// Installed cylinder at `position`, if any.
    pub fn port(&self, position: u8) -> Option<&PortCfg> {
        self.ports.iter().find(|p| p.position == position)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Station
        if self.station.num_gas_ports == 0 || self.station.num_gas_ports > MAX_GAS_PORTS {
            eyre::bail!("station.num_gas_ports must be in [1, {MAX_GAS_PORTS}]");
        }
        if let Some(offset) = self.station.flow_offset_raw
            && offset > 1023
        {
            eyre::bail!("station.flow_offset_raw must be <= 1023 (10-bit A2D)");
        }

        // Timing
        let t = &self.timing;
        if t.reservoir_interval_ms == 0 || t.non_reservoir_interval_ms == 0 {
            eyre::bail!("timing.*_interval_ms must be >= 1");
        }
        if t.close_wait_poll_ms == 0 {
            eyre::bail!("timing.close_wait_poll_ms must be >= 1");
        }
        if t.close_wait_attempts == 0 {
            eyre::bail!("timing.close_wait_attempts must be >= 1");
        }
        if t.stabilize_ms > 60_000 || t.relieve_ms > 60_000 {
            eyre::bail!("timing.stabilize_ms/relieve_ms is unreasonably large (>60s)");
        }

        // Regulator
        if self.regulator.sensor_retry_limit == 0 {
            eyre::bail!("regulator.sensor_retry_limit must be >= 1");
        }

        // Simulator
        let s = &self.simulator;
        if !s.ml_per_volt.is_finite() || s.ml_per_volt < 0.0 {
            eyre::bail!("simulator.ml_per_volt must be finite and >= 0");
        }
        if s.max_flow_ml < 0 {
            eyre::bail!("simulator.max_flow_ml must be >= 0");
        }

        // Ports
        let mut seen = HashSet::new();
        for p in &self.ports {
            if p.position == 0 || p.position > self.station.num_gas_ports {
                eyre::bail!(
                    "ports: position {} outside [1, {}]",
                    p.position,
                    self.station.num_gas_ports
                );
            }
            if !seen.insert(p.position) {
                eyre::bail!("ports: duplicate position {}", p.position);
            }
            if p.part_number.trim().is_empty() {
                eyre::bail!("ports: position {} has an empty part_number", p.position);
            }
            for g in &p.gases {
                if !g.concentration.is_finite() || g.concentration < 0.0 {
                    eyre::bail!(
                        "ports: position {} gas {} has an invalid concentration",
                        p.position,
                        g.code
                    );
                }
            }
        }

        Ok(())
    }
}
