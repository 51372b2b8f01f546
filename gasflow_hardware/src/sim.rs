use std::sync::{Arc, Mutex};

use gasflow_traits::{HardwarePort, PortError};
use tracing::trace;

use crate::error::HwError;

/// Snapshot of the simulated manifold handed to the flow model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimView {
    pub pump_on: bool,
    pub voltage: u8,
    pub open_port: Option<u8>,
}

/// Raw sensor counts produced by the flow model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimReading {
    pub raw_flow: u16,
    pub raw_vacuum: u16,
}

type FlowModel = Box<dyn Fn(&SimView) -> SimReading + Send + Sync>;

#[derive(Debug, Default)]
struct SimState {
    view: SimView,
    flow_reads: u64,
    vacuum_reads: u64,
    fail_every: u64,
}

/// Read-only handle onto a simulator that has been moved into a controller.
#[derive(Debug, Clone)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimProbe {
    pub fn view(&self) -> SimView {
        self.state.lock().map(|s| s.view).unwrap_or_default()
    }
    pub fn flow_reads(&self) -> u64 {
        self.state.lock().map(|s| s.flow_reads).unwrap_or(0)
    }
    pub fn vacuum_reads(&self) -> u64 {
        self.state.lock().map(|s| s.vacuum_reads).unwrap_or(0)
    }
}

/// Pump/valve manifold whose sensors follow a caller-supplied model.
///
/// The model receives the current pump and valve state and returns raw A2D
/// counts. With the pump off or no valve open the flow sensor reads zero
/// regardless of the model.
pub struct SimulatedManifold {
    num_ports: u8,
    state: Arc<Mutex<SimState>>,
    model: FlowModel,
}

impl SimulatedManifold {
    pub fn new(
        num_ports: u8,
        model: impl Fn(&SimView) -> SimReading + Send + Sync + 'static,
    ) -> Self {
        Self {
            num_ports,
            state: Arc::new(Mutex::new(SimState::default())),
            model: Box::new(model),
        }
    }

    /// Fail every `n`th flow read with a transient sensor error (0 disables).
    pub fn with_fail_every(self, n: u64) -> Self {
        if let Ok(mut s) = self.state.lock() {
            s.fail_every = n;
        }
        self
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: self.state.clone(),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> Result<T, HwError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| HwError::Io(std::io::Error::other("simulator state poisoned")))?;
        Ok(f(&mut guard))
    }
}

impl HardwarePort for SimulatedManifold {
    fn set_pump_state(&mut self, on: bool) {
        let _ = self.with_state(|s| s.view.pump_on = on);
        trace!(on, "sim pump state");
    }

    fn pump_state(&self) -> bool {
        self.with_state(|s| s.view.pump_on).unwrap_or(false)
    }

    fn set_pump_voltage(&mut self, voltage: u8) -> Result<(), PortError> {
        self.with_state(|s| s.view.voltage = voltage)?;
        trace!(voltage, "sim pump voltage");
        Ok(())
    }

    fn pump_voltage(&self) -> u8 {
        self.with_state(|s| s.view.voltage).unwrap_or(0)
    }

    fn set_solenoid_state(&mut self, port: u8, open: bool) {
        if port == 0 || port > self.num_ports {
            return;
        }
        let _ = self.with_state(|s| {
            if open {
                s.view.open_port = Some(port);
            } else if s.view.open_port == Some(port) {
                s.view.open_port = None;
            }
        });
        trace!(port, open, "sim solenoid");
    }

    fn read_raw_flow(&mut self, _reservoir: bool) -> Result<u16, PortError> {
        let (view, failed) = self.with_state(|s| {
            s.flow_reads += 1;
            let failed = s.fail_every > 0 && s.flow_reads.is_multiple_of(s.fail_every);
            (s.view, failed)
        })?;
        if failed {
            return Err(HwError::FlowRead("injected fault".into()).into());
        }
        if !view.pump_on || view.open_port.is_none() {
            return Ok(0);
        }
        Ok((self.model)(&view).raw_flow)
    }

    fn read_raw_vacuum(&mut self) -> Result<u16, PortError> {
        let view = self.with_state(|s| {
            s.vacuum_reads += 1;
            s.view
        })?;
        Ok((self.model)(&view).raw_vacuum)
    }
}
