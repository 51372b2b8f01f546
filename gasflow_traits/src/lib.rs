pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at the hardware boundary.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Raw pump/valve/sensor access for one gas manifold.
///
/// Implementations wrap the device driver (or a simulator). Callers are
/// expected to serialize access; `gasflow_core` only touches a port while
/// holding its pump lock.
pub trait HardwarePort {
    fn set_pump_state(&mut self, on: bool);
    fn pump_state(&self) -> bool;

    fn set_pump_voltage(&mut self, voltage: u8) -> Result<(), PortError>;
    fn pump_voltage(&self) -> u8;

    /// Open or close the solenoid for `port` (1-based). Opening a port
    /// implicitly closes every other port.
    fn set_solenoid_state(&mut self, port: u8, open: bool);

    /// Blocking read of the flow sensor in A2D counts. `reservoir` selects the
    /// sampling profile for reservoir-equipped hardware.
    fn read_raw_flow(&mut self, reservoir: bool) -> Result<u16, PortError>;
    /// Blocking read of the vacuum sensor in A2D counts.
    fn read_raw_vacuum(&mut self) -> Result<u16, PortError>;
}

impl<T: HardwarePort + ?Sized> HardwarePort for Box<T> {
    fn set_pump_state(&mut self, on: bool) {
        (**self).set_pump_state(on);
    }
    fn pump_state(&self) -> bool {
        (**self).pump_state()
    }
    fn set_pump_voltage(&mut self, voltage: u8) -> Result<(), PortError> {
        (**self).set_pump_voltage(voltage)
    }
    fn pump_voltage(&self) -> u8 {
        (**self).pump_voltage()
    }
    fn set_solenoid_state(&mut self, port: u8, open: bool) {
        (**self).set_solenoid_state(port, open);
    }
    fn read_raw_flow(&mut self, reservoir: bool) -> Result<u16, PortError> {
        (**self).read_raw_flow(reservoir)
    }
    fn read_raw_vacuum(&mut self) -> Result<u16, PortError> {
        (**self).read_raw_vacuum()
    }
}
