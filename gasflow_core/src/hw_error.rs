//! Maps `Box<dyn Error>` from the port boundary to typed `FlowError`.
//!
//! `gasflow_traits::HardwarePort` uses `Box<dyn Error + Send + Sync>` so any
//! driver can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `gasflow_hardware::HwError`.

use crate::error::FlowError;

/// Map a port-boundary error to a typed `FlowError`.
///
/// Sensor read failures come back as `Hardware` (transient; the regulator
/// retries them), command failures as `HardwareFault`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FlowError {
    #[cfg(feature = "hardware-errors")]
    {
        use gasflow_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => FlowError::Timeout,
                HwError::FlowRead(_) | HwError::VacuumRead(_) => FlowError::Hardware(hw.to_string()),
                other => FlowError::HardwareFault(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        FlowError::Timeout
    } else {
        FlowError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_errors_fall_back_by_message() {
        let e: Box<dyn std::error::Error + Send + Sync> = "adc timeout".into();
        assert_eq!(map_hw_error(&*e), FlowError::Timeout);
        let e: Box<dyn std::error::Error + Send + Sync> = "i2c nack".into();
        assert_eq!(map_hw_error(&*e), FlowError::Hardware("i2c nack".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hardware_errors_downcast() {
        use gasflow_hardware::HwError;
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::PumpVoltage(7));
        assert!(matches!(map_hw_error(&*e), FlowError::HardwareFault(_)));
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::FlowRead("glitch".into()));
        assert!(matches!(map_hw_error(&*e), FlowError::Hardware(_)));
    }
}
