//! Closed-loop flow regulation (`check_flow`).
//!
//! Each iteration samples flow and vacuum under the pump lock, converts them
//! through the calibration curves and nudges the pump voltage toward the
//! desired flow. Sleeps happen outside the lock so a close on another thread
//! is never held up by more than one sensor read.

use std::sync::Arc;
use std::time::Duration;

use gasflow_traits::HardwarePort;
use tracing::{debug, error, trace, warn};

use crate::gas_path::{
    GasPathController, MAX_FLOW_RATE, MAX_VOLTAGE, MIN_VOLTAGE, STANDARD_FLOW_RATE, SensorRead,
};
use crate::tubing::is_bad_tubing;
use crate::types::{FlowCheck, FlowSample, FlowStatus};

/// mL/min either side of the target that counts as on target.
pub const FLOW_TOLERANCE: i32 = 5;
/// mL/min below which a sample counts toward empty-cylinder detection.
pub const HIGH_FLOW_THRESHOLD: i32 = 50;
/// Consecutive low samples that declare a cylinder empty.
pub const LOW_FLOW_SAMPLE_LIMIT: u32 = 5;

/// Voltage step for a deviation of `diff` mL/min (absolute).
#[inline]
pub fn voltage_step(diff: i32) -> i32 {
    match diff.abs() {
        d if d > 50 => 10,
        d if d > 25 => 5,
        d if d > 10 => 2,
        _ => 1,
    }
}

/// Drives the flow of an open gas path toward its desired rate.
///
/// Cheap to clone; clones share the same controller, so one can run on a
/// background thread while the owner closes the path.
pub struct FlowRegulator<P: HardwarePort> {
    path: Arc<GasPathController<P>>,
}

impl<P: HardwarePort> Clone for FlowRegulator<P> {
    fn clone(&self) -> Self {
        Self {
            path: Arc::clone(&self.path),
        }
    }
}

impl<P: HardwarePort> core::fmt::Debug for FlowRegulator<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlowRegulator")
            .field("path", &self.path)
            .finish()
    }
}

impl<P: HardwarePort> FlowRegulator<P> {
    pub fn new(path: Arc<GasPathController<P>>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Arc<GasPathController<P>> {
        &self.path
    }

    /// Regulate until the flow is within tolerance, a terminal status is
    /// reached, the path closes, or `timeout` expires (`None` = unbounded).
    ///
    /// Never fails: sensor errors are retried, running out of voltage range
    /// is reported as `TooLow`/`TooHigh`, and a timeout returns the last
    /// computed status.
    #[allow(clippy::too_many_lines)]
    pub fn check_flow(&self, timeout: Option<Duration>) -> FlowCheck {
        let path = &*self.path;
        if !path.is_check_flow_enabled() {
            return FlowCheck::passthrough();
        }
        let Some(desired) = path.desired_flow() else {
            debug!("no desired flow set; skipping flow check");
            return FlowCheck::passthrough();
        };
        let _in_flight = path.enter_check();

        let hw = path.hardware();
        let clock = path.clock();
        let interval_ms = path.timing().interval_ms(hw);
        let retry_limit = path.regulator_cfg().sensor_retry_limit;
        let max_target = desired >= MAX_FLOW_RATE;
        let (fresh_air, zero_air) = path
            .open_endpoint()
            .map_or((false, false), |ep| {
                (ep.cylinder.is_fresh_air(), ep.cylinder.is_zero_air())
            });

        let started = clock.now();
        let mut status = FlowStatus::Accurate;
        let mut raw_flow = 0;
        let mut raw_vacuum = 0;
        let mut last_flow: Option<i32> = None;
        let mut low_samples = 0u32;
        let mut failures = 0u32;
        let mut first = true;

        loop {
            if !path.is_check_flow_enabled() {
                debug!("flow regulation disabled mid-check");
                break;
            }
            let elapsed = clock.now().saturating_duration_since(started);
            if timeout.is_some_and(|limit| elapsed >= limit) {
                warn!(
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    status = %status,
                    desired_flow = desired,
                    "flow check timed out"
                );
                break;
            }
            if first {
                first = false;
                if !hw.is_reservoir() && !max_target && path.take_pump_start() {
                    trace!(stabilize_ms = path.timing().stabilize_ms, "waiting for flow sensor");
                    clock.sleep_ms(path.timing().stabilize_ms);
                }
            }

            let (voltage, flow_counts, vacuum_counts) = match path.read_sensors() {
                SensorRead::Sample {
                    voltage,
                    raw_flow,
                    raw_vacuum,
                } => (voltage, raw_flow, raw_vacuum),
                SensorRead::PumpStopped => {
                    debug!("pump stopped; ending flow check");
                    break;
                }
                SensorRead::NoValve => {
                    debug!("no open valve; ending flow check");
                    break;
                }
                SensorRead::Failed(e) => {
                    failures += 1;
                    if failures >= retry_limit {
                        error!(failures, error = %e, "flow sensor keeps failing; giving up");
                        break;
                    }
                    warn!(failures, error = %e, "transient sensor read failure; retrying");
                    clock.sleep_ms(interval_ms);
                    continue;
                }
            };
            failures = 0;

            let sample = FlowSample::from_raw(flow_counts, vacuum_counts, path.flow_offset_raw(), hw);
            path.record_sample(sample);
            raw_flow = flow_counts;
            raw_vacuum = vacuum_counts;
            let flow = sample.flow_ml_per_min;
            last_flow = Some(flow);
            if flow < HIGH_FLOW_THRESHOLD {
                low_samples += 1;
            } else {
                low_samples = 0;
            }

            let diff = flow - desired;
            if diff.abs() <= FLOW_TOLERANCE {
                status = FlowStatus::Accurate;
                path.set_bad_tubing(false);
                trace!(voltage, flow_ml = flow, desired_flow = desired, "flow on target");
                break;
            }

            let new_voltage = if max_target {
                MAX_VOLTAGE
            } else {
                let step = voltage_step(diff);
                let v = if diff < 0 {
                    i32::from(voltage) + step
                } else {
                    i32::from(voltage) - step
                };
                u8::try_from(v.clamp(i32::from(MIN_VOLTAGE), i32::from(MAX_VOLTAGE)))
                    .unwrap_or(MAX_VOLTAGE)
            };

            status = if max_target {
                // Nothing left to ramp once the pump sits at full voltage and the
                // cylinder is flowing; the final downgrade reports Inaccurate.
                // Low flow here is left to the empty-cylinder rules below.
                if voltage == MAX_VOLTAGE && flow >= HIGH_FLOW_THRESHOLD {
                    FlowStatus::TooLow
                } else {
                    FlowStatus::Inaccurate
                }
            } else if diff < 0 && new_voltage == MAX_VOLTAGE && voltage == MAX_VOLTAGE {
                FlowStatus::TooLow
            } else if diff > 0 && new_voltage == MIN_VOLTAGE && voltage == MIN_VOLTAGE {
                FlowStatus::TooHigh
            } else {
                FlowStatus::Inaccurate
            };
            path.set_bad_tubing(is_bad_tubing(status, new_voltage, sample.vacuum_inches, hw));

            trace!(
                voltage,
                new_voltage,
                flow_ml = flow,
                vacuum_in = sample.vacuum_inches,
                desired_flow = desired,
                status = %status,
                "flow check iteration"
            );

            if status.is_terminal() {
                warn!(voltage, flow_ml = flow, desired_flow = desired, status = %status, "pump voltage out of range");
                break;
            }

            if low_samples >= LOW_FLOW_SAMPLE_LIMIT {
                if max_target && voltage == MAX_VOLTAGE && !fresh_air {
                    status = FlowStatus::TooLow;
                    warn!(low_samples, flow_ml = flow, "no flow at full pump voltage; cylinder empty");
                    break;
                }
                if zero_air {
                    status = FlowStatus::TooLow;
                    warn!(low_samples, flow_ml = flow, "zero air cylinder empty");
                    break;
                }
            }

            if new_voltage != voltage {
                match path.apply_voltage(new_voltage) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("gas path closed during flow check");
                        break;
                    }
                    Err(e) => warn!(voltage = new_voltage, error = %e, "pump voltage not applied"),
                }
            }
            clock.sleep_ms(interval_ms);
        }

        if desired > STANDARD_FLOW_RATE && status != FlowStatus::Accurate {
            status = if last_flow.unwrap_or(0) >= HIGH_FLOW_THRESHOLD {
                FlowStatus::Inaccurate
            } else {
                FlowStatus::TooLow
            };
        }
        path.set_flow_achieved(status == FlowStatus::Accurate && last_flow.is_some());

        debug!(status = %status, raw_flow, raw_vacuum, desired_flow = desired, "flow check finished");
        FlowCheck {
            status,
            raw_flow,
            raw_vacuum,
        }
    }
}
