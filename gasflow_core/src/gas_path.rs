//! Gas path ownership: valves, pump on/off and pump voltage.
//!
//! `GasPathController` is the only code allowed to issue raw valve and pump
//! commands. Every hardware access happens while holding the pump lock, so an
//! observer never sees a half-open path. Opening is always valve-then-pump,
//! closing always pump-then-valve.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use gasflow_traits::{Clock, HardwarePort};
use tracing::{debug, warn};

use crate::config::{RegulatorCfg, TimingCfg};
use crate::error::{FlowError, Report, Result};
use crate::hw_error::map_hw_error;
use crate::types::{DeviceType, FlowSample, GasEndPoint, HardwareGeneration, PumpState};

pub const MIN_VOLTAGE: u8 = 0;
pub const MAX_VOLTAGE: u8 = 255;
/// mL/min; the span-reserve rate engineering fixed as adequate at any temperature.
pub const STANDARD_FLOW_RATE: i32 = 550;
/// mL/min; a target at this rate runs the pump flat out.
pub const MAX_FLOW_RATE: i32 = 1000;
/// Relief always vents through the first port.
const RELIEF_PORT: u8 = 1;

/// Pump voltage a fresh path starts at before the regulator takes over.
///
/// The per-device values are provisional placeholders and must be replaced
/// with the production start-voltage table. Only the `Other` fallback,
/// a third of the voltage range, is fixed.
pub fn standard_start_voltage(hw: HardwareGeneration, device: DeviceType) -> u8 {
    use DeviceType::{GbPlus, GbPro, Mx4, Mx6, SafeCore, Tx1, Ventis, VentisPro};
    match hw {
        HardwareGeneration::Reservoir => match device {
            Mx4 | Ventis => 83,
            VentisPro | SafeCore => 85,
            Mx6 => 90,
            Tx1 => 80,
            GbPro | GbPlus => 70,
            DeviceType::Other => default_start_voltage(),
        },
        HardwareGeneration::NonReservoir => match device {
            Mx4 | Ventis => 100,
            VentisPro | SafeCore => 105,
            Mx6 => 110,
            Tx1 => 95,
            GbPro | GbPlus => 90,
            DeviceType::Other => default_start_voltage(),
        },
    }
}

#[inline]
const fn default_start_voltage() -> u8 {
    (MAX_VOLTAGE - MIN_VOLTAGE) / 3
}

/// Outcome of one locked sensor read.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SensorRead {
    PumpStopped,
    NoValve,
    Sample {
        voltage: u8,
        raw_flow: u16,
        raw_vacuum: u16,
    },
    Failed(FlowError),
}

struct PathState<P> {
    port: P,
    pump: PumpState,
    open_port: Option<u8>,
    open_endpoint: Option<GasEndPoint>,
    desired_flow: Option<i32>,
    /// Pump start the regulator already waited out the sensor warm-up for.
    stabilized_start: Option<Instant>,
    last_sample: Option<FlowSample>,
}

/// Marks a flow check as running until dropped; `close_gas_end_point` waits
/// for the count to reach zero.
pub(crate) struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct GasPathController<P: HardwarePort> {
    state: Mutex<PathState<P>>,
    hardware: HardwareGeneration,
    device_type: DeviceType,
    num_gas_ports: u8,
    flow_offset_raw: Option<u16>,
    timing: TimingCfg,
    regulator: RegulatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    do_check_flow: AtomicBool,
    checks_in_flight: AtomicUsize,
    flow_achieved: AtomicBool,
    bad_tubing: AtomicBool,
}

impl<P: HardwarePort> core::fmt::Debug for GasPathController<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GasPathController")
            .field("hardware", &self.hardware)
            .field("device_type", &self.device_type)
            .field("num_gas_ports", &self.num_gas_ports)
            .finish_non_exhaustive()
    }
}

impl<P: HardwarePort> GasPathController<P> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        port: P,
        hardware: HardwareGeneration,
        device_type: DeviceType,
        num_gas_ports: u8,
        flow_offset_raw: Option<u16>,
        timing: TimingCfg,
        regulator: RegulatorCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            state: Mutex::new(PathState {
                port,
                pump: PumpState::default(),
                open_port: None,
                open_endpoint: None,
                desired_flow: None,
                stabilized_start: None,
                last_sample: None,
            }),
            hardware,
            device_type,
            num_gas_ports,
            flow_offset_raw,
            timing,
            regulator,
            clock,
            do_check_flow: AtomicBool::new(true),
            checks_in_flight: AtomicUsize::new(0),
            flow_achieved: AtomicBool::new(false),
            bad_tubing: AtomicBool::new(false),
        }
    }

    /// Pump lock. A panic while holding it leaves hardware state as last
    /// commanded, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, PathState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn is_valid_port(&self, id: u8) -> bool {
        (1..=self.num_gas_ports).contains(&id)
    }

    fn start_voltage(&self, desired: Option<i32>) -> u8 {
        match desired {
            Some(ml) if ml >= MAX_FLOW_RATE => MAX_VOLTAGE,
            _ => standard_start_voltage(self.hardware, self.device_type),
        }
    }

    fn start_pump(&self, st: &mut PathState<P>, voltage: u8) -> std::result::Result<(), FlowError> {
        st.port
            .set_pump_voltage(voltage)
            .map_err(|e| map_hw_error(&*e))?;
        st.port.set_pump_state(true);
        let now = self.clock.now();
        st.pump = PumpState {
            running: true,
            voltage,
            started_at: Some(now),
            last_started_at: Some(now),
        };
        Ok(())
    }

    fn stop_pump(st: &mut PathState<P>) {
        st.port.set_pump_state(false);
        st.pump.running = false;
        st.pump.started_at = None;
    }

    /// Open `endpoint`'s valve, let it settle, then start the pump.
    ///
    /// The desired flow must already be set; it picks the start voltage.
    pub fn open_gas_end_point(&self, endpoint: &GasEndPoint) -> Result<()> {
        if !self.is_valid_port(endpoint.port) {
            return Err(Report::new(FlowError::InvalidPort {
                port: endpoint.port,
                max: self.num_gas_ports,
            }));
        }
        let mut st = self.lock();
        let Some(desired) = st.desired_flow else {
            return Err(Report::new(FlowError::State(
                "desired flow must be set before opening a gas path".into(),
            )));
        };
        if let Some(previous) = st.open_port {
            debug!(previous, port = endpoint.port, "replacing open gas path");
        }
        let voltage = self.start_voltage(Some(desired));

        st.port.set_solenoid_state(endpoint.port, true);
        st.open_port = Some(endpoint.port);
        self.clock.sleep_ms(self.timing.open_settle_ms);

        if let Err(e) = self.start_pump(&mut st, voltage) {
            st.port.set_solenoid_state(endpoint.port, false);
            st.open_port = None;
            return Err(Report::new(e).wrap_err(format!("start pump for gas port {}", endpoint.port)));
        }
        st.open_endpoint = Some(endpoint.clone());
        drop(st);

        self.flow_achieved.store(false, Ordering::Release);
        self.bad_tubing.store(false, Ordering::Release);
        debug!(
            port = endpoint.port,
            part_number = %endpoint.cylinder.part_number,
            voltage,
            desired_flow = desired,
            "gas path opened"
        );
        Ok(())
    }

    /// Stop the pump, then close the valve, then wait (bounded) for any
    /// in-flight flow check to notice. `None` only forgets the open endpoint.
    pub fn close_gas_end_point(&self, endpoint: Option<&GasEndPoint>) {
        let Some(endpoint) = endpoint else {
            self.lock().open_endpoint = None;
            return;
        };
        {
            let mut st = self.lock();
            Self::stop_pump(&mut st);
            self.clock.sleep_ms(self.timing.close_settle_ms);
            if self.is_valid_port(endpoint.port) {
                st.port.set_solenoid_state(endpoint.port, false);
            } else {
                warn!(port = endpoint.port, max = self.num_gas_ports, "invalid gas port on close");
            }
            if st.open_port == Some(endpoint.port) {
                st.open_port = None;
            }
            self.clock.sleep_ms(self.timing.close_settle_ms);
            st.open_endpoint = None;
        }
        self.flow_achieved.store(false, Ordering::Release);
        debug!(port = endpoint.port, "gas path closed");
        self.wait_for_flow_checks();
    }

    fn wait_for_flow_checks(&self) {
        for _ in 0..self.timing.close_wait_attempts {
            if self.checks_in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            self.clock.sleep_ms(self.timing.close_wait_poll_ms);
        }
        if self.checks_in_flight.load(Ordering::Acquire) != 0 {
            warn!(
                waited_ms = self.timing.close_wait_poll_ms * u64::from(self.timing.close_wait_attempts),
                "flow check still running after close"
            );
        }
    }

    pub fn open_valve(&self, id: u8, start_pump: bool) {
        if !self.is_valid_port(id) {
            warn!(port = id, max = self.num_gas_ports, "ignoring open of invalid gas port");
            return;
        }
        let mut st = self.lock();
        st.port.set_solenoid_state(id, true);
        st.open_port = Some(id);
        if start_pump {
            self.clock.sleep_ms(self.timing.open_settle_ms);
            let voltage = self.start_voltage(st.desired_flow);
            if let Err(e) = self.start_pump(&mut st, voltage) {
                warn!(port = id, voltage, error = %e, "pump start failed");
            }
        }
        debug!(port = id, start_pump, "valve opened");
    }

    pub fn close_valve(&self, id: u8, stop_pump: bool) {
        if !self.is_valid_port(id) {
            warn!(port = id, max = self.num_gas_ports, "ignoring close of invalid gas port");
            return;
        }
        let mut st = self.lock();
        if stop_pump {
            Self::stop_pump(&mut st);
            self.clock.sleep_ms(self.timing.close_settle_ms);
        }
        st.port.set_solenoid_state(id, false);
        if st.open_port == Some(id) {
            st.open_port = None;
            st.open_endpoint = None;
        }
        debug!(port = id, stop_pump, "valve closed");
    }

    pub fn close_all_valves(&self, stop_pump: bool) {
        let mut st = self.lock();
        if stop_pump {
            Self::stop_pump(&mut st);
            self.clock.sleep_ms(self.timing.close_settle_ms);
        }
        for id in 1..=self.num_gas_ports {
            st.port.set_solenoid_state(id, false);
        }
        st.open_port = None;
        st.open_endpoint = None;
        debug!(stop_pump, "all valves closed");
    }

    /// Vent trapped pressure through port 1 with regulation suspended.
    /// Does nothing while a path is open or the pump runs.
    pub fn relieve_internal_pressure(&self) {
        {
            let st = self.lock();
            if st.pump.running || st.open_port.is_some() {
                debug!(open_port = ?st.open_port, "gas path busy; skipping pressure relief");
                return;
            }
        }
        let previous = self.do_check_flow.swap(false, Ordering::AcqRel);
        self.open_valve(RELIEF_PORT, true);
        self.clock.sleep_ms(self.timing.relieve_ms);
        self.close_valve(RELIEF_PORT, true);
        self.do_check_flow.store(previous, Ordering::Release);
        debug!("internal pressure relieved");
    }

    /// Open port, or 0 when every valve is closed.
    pub fn get_open_valve_position(&self) -> u8 {
        self.lock().open_port.unwrap_or(0)
    }

    pub fn set_desired_flow(&self, ml_per_min: i32) -> Result<()> {
        if !(1..=MAX_FLOW_RATE).contains(&ml_per_min) {
            return Err(Report::new(FlowError::Config(format!(
                "desired flow {ml_per_min} mL/min outside [1, {MAX_FLOW_RATE}]"
            ))));
        }
        self.lock().desired_flow = Some(ml_per_min);
        self.flow_achieved.store(false, Ordering::Release);
        Ok(())
    }

    pub fn desired_flow(&self) -> Option<i32> {
        self.lock().desired_flow
    }

    /// Any thread may flip this without taking the pump lock.
    pub fn set_check_flow_enabled(&self, enabled: bool) {
        self.do_check_flow.store(enabled, Ordering::Release);
    }

    pub fn is_check_flow_enabled(&self) -> bool {
        self.do_check_flow.load(Ordering::Acquire)
    }

    pub fn is_pump_running(&self) -> bool {
        self.lock().pump.running
    }

    pub fn pump_voltage(&self) -> u8 {
        self.lock().pump.voltage
    }

    pub fn pump_state(&self) -> PumpState {
        self.lock().pump
    }

    pub fn open_endpoint(&self) -> Option<GasEndPoint> {
        self.lock().open_endpoint.clone()
    }

    pub fn is_desired_flow_achieved(&self) -> bool {
        self.flow_achieved.load(Ordering::Acquire)
    }

    /// Latched by the last flow check; always false on reservoir hardware.
    pub fn is_bad_pump_tubing(&self) -> bool {
        self.bad_tubing.load(Ordering::Acquire)
    }

    pub fn last_sample(&self) -> Option<FlowSample> {
        self.lock().last_sample
    }

    pub fn hardware(&self) -> HardwareGeneration {
        self.hardware
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn num_gas_ports(&self) -> u8 {
        self.num_gas_ports
    }

    pub fn flow_offset_raw(&self) -> Option<u16> {
        self.flow_offset_raw
    }

    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    pub fn regulator_cfg(&self) -> &RegulatorCfg {
        &self.regulator
    }

    /// Flow checks currently running on any thread.
    pub fn checks_in_flight(&self) -> usize {
        self.checks_in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn clock(&self) -> &(dyn Clock + Send + Sync) {
        &*self.clock
    }

    pub(crate) fn enter_check(&self) -> InFlight<'_> {
        self.checks_in_flight.fetch_add(1, Ordering::AcqRel);
        InFlight(&self.checks_in_flight)
    }

    /// True once per pump start: the first caller after a start gets to wait
    /// out the sensor warm-up.
    pub(crate) fn take_pump_start(&self) -> bool {
        let mut st = self.lock();
        let started = st.pump.last_started_at;
        if st.pump.running && started.is_some() && started != st.stabilized_start {
            st.stabilized_start = started;
            true
        } else {
            false
        }
    }

    pub(crate) fn read_sensors(&self) -> SensorRead {
        let mut st = self.lock();
        if !st.port.pump_state() {
            return SensorRead::PumpStopped;
        }
        if st.open_port.is_none() {
            return SensorRead::NoValve;
        }
        let voltage = st.port.pump_voltage();
        let raw_flow = match st.port.read_raw_flow(self.hardware.is_reservoir()) {
            Ok(v) => v,
            Err(e) => return SensorRead::Failed(map_hw_error(&*e)),
        };
        let raw_vacuum = match st.port.read_raw_vacuum() {
            Ok(v) => v,
            Err(e) => return SensorRead::Failed(map_hw_error(&*e)),
        };
        SensorRead::Sample {
            voltage,
            raw_flow,
            raw_vacuum,
        }
    }

    pub(crate) fn record_sample(&self, sample: FlowSample) {
        self.lock().last_sample = Some(sample);
    }

    /// Set the pump voltage if the path is still open. `Ok(false)` means the
    /// path closed underneath the caller.
    pub(crate) fn apply_voltage(&self, voltage: u8) -> std::result::Result<bool, FlowError> {
        let mut st = self.lock();
        if !st.port.pump_state() || st.open_port.is_none() {
            return Ok(false);
        }
        st.port
            .set_pump_voltage(voltage)
            .map_err(|e| map_hw_error(&*e))?;
        st.pump.voltage = voltage;
        Ok(true)
    }

    pub(crate) fn set_flow_achieved(&self, achieved: bool) {
        self.flow_achieved.store(achieved, Ordering::Release);
    }

    pub(crate) fn set_bad_tubing(&self, bad: bool) {
        self.bad_tubing.store(bad, Ordering::Release);
    }
}
