//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "gasflow", version, about = "Docking-station gas path CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/gasflow.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a gas port, regulate to the target flow, hold, then close
    Deliver {
        /// Gas port (1-based manifold position)
        #[arg(long)]
        port: u8,
        /// Target flow in mL/min (1..=1000)
        #[arg(long, default_value_t = 550)]
        flow: i32,
        /// Keep the path open this many seconds after regulation settles
        #[arg(long, value_name = "SECS", default_value_t = 0)]
        seconds: u64,
        /// Give up regulating after this many ms (0 = no limit)
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
        /// Re-check period while holding, in ms
        #[arg(long, value_name = "MS", default_value_t = 1_000)]
        recheck_ms: u64,
    },
    /// Vent the manifold through port 1 with the pump briefly running
    Relieve,
    /// Quick health check: valve/pump ordering and sensor reads on the simulator
    SelfCheck,
}
