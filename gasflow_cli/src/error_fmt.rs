//! Human-readable error descriptions and structured JSON error formatting.

use gasflow_core::FlowStatus;
use gasflow_core::error::{BuildError, FlowError};

/// First error of type `T` in the report, its context or its causes.
fn find<T: std::error::Error + Send + Sync + 'static>(err: &eyre::Report) -> Option<&T> {
    err.downcast_ref::<T>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<T>()))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingHardware => {
                "What happened: The manifold generation was not set.\nLikely causes: The gas path was built without a [station] hardware value.\nHow to fix: Set station.hardware to \"reservoir\" or \"non-reservoir\" in the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(fe) = find::<FlowError>(err) {
        return match fe {
            FlowError::InvalidPort { port, max } => format!(
                "What happened: Gas port {port} does not exist on this station.\nLikely causes: The manifold only has ports 1 to {max}.\nHow to fix: Pick a port between 1 and {max}, or correct station.num_gas_ports."
            ),
            FlowError::Regulation(FlowStatus::TooLow) => {
                "What happened: Flow stayed below the target even at full pump voltage.\nLikely causes: Empty or closed cylinder, or a blocked or kinked gas line.\nHow to fix: Replace or open the cylinder on that port and check the tubing, then rerun.".to_string()
            }
            FlowError::Regulation(FlowStatus::TooHigh) => {
                "What happened: Flow stayed above the target with the pump at minimum voltage.\nLikely causes: A pressurised supply feeding the manifold, or a wrong flow sensor offset.\nHow to fix: Check the cylinder regulator and station.flow_offset_raw.".to_string()
            }
            FlowError::Config(msg) => format!(
                "What happened: Invalid flow request ({msg}).\nLikely causes: --flow outside 1..=1000 mL/min.\nHow to fix: Pass a flow between 1 and 1000."
            ),
            FlowError::Timeout => {
                "What happened: A manifold sensor read timed out.\nLikely causes: Sensor board not powered or not responding.\nHow to fix: Check the manifold connection and rerun with --log-level=debug.".to_string()
            }
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Point --config at an existing TOML file. Original: {msg}"
        );
    }

    const SECTIONS: [&str; 6] = ["station.", "timing.", "regulator.", "simulator.", "logging.", "ports:"];
    if lower.starts_with("parse config") || SECTIONS.iter().any(|s| lower.starts_with(s)) {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing [station] table or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let cause = err
        .chain()
        .nth(1)
        .map(|src| format!(" Cause: {src}"))
        .unwrap_or_default();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Regulation failures get their own exit codes; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match find::<FlowError>(err) {
        Some(FlowError::Regulation(FlowStatus::TooLow)) => 3,
        Some(FlowError::Regulation(FlowStatus::TooHigh)) => 4,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match find::<FlowError>(err) {
        Some(FlowError::Regulation(status)) => {
            json!({ "reason": status.name(), "details": { "context": err.to_string() }, "message": msg })
        }
        Some(FlowError::InvalidPort { port, max }) => {
            json!({ "reason": "InvalidPort", "details": { "port": port, "max": max }, "message": msg })
        }
        _ => json!({ "reason": "Error", "message": msg }),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_regulation_errors_keep_their_exit_code() {
        let err = eyre::Report::new(FlowError::Regulation(FlowStatus::TooHigh))
            .wrap_err("gas port 2 at 550 mL/min");
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("minimum voltage"));

        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "TooHigh");
        assert_eq!(v["details"]["context"], "gas port 2 at 550 mL/min");
    }

    #[test]
    fn config_messages_are_recognised() {
        let err = eyre::eyre!("station.num_gas_ports must be in [1, 12]");
        assert!(humanize(&err).starts_with("What happened: Configuration is invalid"));
        assert_eq!(exit_code_for_error(&err), 1);
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("boom");
        assert!(humanize(&err).contains("Original: boom"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Error");
    }
}
