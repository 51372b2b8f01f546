#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Closed-loop gas flow regulation (hardware-agnostic).
//!
//! All hardware access goes through `gasflow_traits::HardwarePort`.
//!
//! ## Architecture
//!
//! - **Calibration curves**: raw A2D counts to millivolts, mL/min and inches
//!   of water (`curve` module)
//! - **Gas path**: valve/pump sequencing under the pump lock (`gas_path`)
//! - **Regulation**: the `check_flow` loop (`regulator`)
//! - **Diagnostics**: bad pump tubing heuristic (`tubing`)
//! - **Background**: periodic re-checks during long operations (`keeper`)
//!   and the open/regulate/hold/close sequence (`runner`)
//!
//! ## Typical use
//!
//! Build a `GasPathController` with `GasPathBuilder`, share it in an `Arc`,
//! set the desired flow, open an endpoint, call `FlowRegulator::check_flow`
//! until it settles, then close the endpoint.

pub mod builder;
pub mod config;
pub mod conversions;
pub mod curve;
pub mod error;
pub mod gas_path;
pub mod hw_error;
pub mod keeper;
pub mod mocks;
pub mod regulator;
pub mod runner;
pub mod tubing;
pub mod types;

pub use builder::{GasPathBuilder, Missing, Set};
pub use config::{RegulatorCfg, TimingCfg};
pub use error::{BuildError, FlowError, Report, Result};
pub use gas_path::{
    GasPathController, MAX_FLOW_RATE, MAX_VOLTAGE, MIN_VOLTAGE, STANDARD_FLOW_RATE,
    standard_start_voltage,
};
pub use keeper::FlowKeeper;
pub use regulator::{FLOW_TOLERANCE, FlowRegulator, HIGH_FLOW_THRESHOLD, LOW_FLOW_SAMPLE_LIMIT};
pub use runner::{DeliveryParams, DeliveryReport, deliver};
pub use types::{
    Cylinder, DeviceType, FRESH_AIR_PART_NUMBER, FlowCheck, FlowSample, FlowStatus,
    GasConcentration, GasEndPoint, HardwareGeneration, PumpState,
};
