//! Hardware-side implementations of `gasflow_traits::HardwarePort`.
//!
//! The device driver itself lives outside this workspace; what ships here is
//! a deterministic simulated manifold and a wrapper that records every port
//! call, both used by the CLI and by the test suites.
pub mod error;
pub mod recorder;
pub mod sim;

pub use error::HwError;
pub use recorder::{CallLog, PortCall, RecordingPort};
pub use sim::{SimProbe, SimReading, SimView, SimulatedManifold};
