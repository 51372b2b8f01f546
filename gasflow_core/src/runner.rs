use crate::error::{FlowError, Report, Result as CoreResult};
use crate::keeper::FlowKeeper;
use crate::regulator::FlowRegulator;
use crate::types::{FlowStatus, GasEndPoint};
use eyre::WrapErr;
use gasflow_traits::HardwarePort;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Poll step while holding a path open.
const HOLD_POLL: Duration = Duration::from_millis(50);

/// One gas delivery: target, how long to regulate, how long to hold.
#[derive(Debug, Clone)]
pub struct DeliveryParams {
    pub endpoint: GasEndPoint,
    pub desired_flow: i32,
    /// Time to keep the path open after the initial regulation.
    pub hold: Duration,
    /// Soft limit for the initial regulation (`None` = until it settles).
    pub regulate_timeout: Option<Duration>,
    /// Background re-check period during the hold.
    pub keeper_period: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub port: u8,
    pub desired_flow: i32,
    pub status: FlowStatus,
    pub raw_flow: u16,
    pub raw_vacuum: u16,
    pub flow_ml_per_min: Option<i32>,
    /// Pump voltage just before the path closed.
    pub final_voltage: u8,
    pub bad_tubing: bool,
    /// The shutdown flag cut the hold short.
    pub interrupted: bool,
}

impl DeliveryReport {
    /// Turn a terminal `TooLow`/`TooHigh` into an error.
    pub fn into_result(self) -> CoreResult<Self> {
        if self.status.is_terminal() {
            return Err(Report::new(FlowError::Regulation(self.status))
                .wrap_err(format!("gas port {} at {} mL/min", self.port, self.desired_flow)));
        }
        Ok(self)
    }
}

/// Set the target, open the path, regulate, hold under a `FlowKeeper`, close.
///
/// The path is always closed before returning once it has been opened.
pub fn deliver<P>(
    regulator: &FlowRegulator<P>,
    params: &DeliveryParams,
    shutdown: &AtomicBool,
) -> CoreResult<DeliveryReport>
where
    P: HardwarePort + Send + 'static,
{
    let path = regulator.path();
    let port = params.endpoint.port;
    path.set_desired_flow(params.desired_flow)
        .wrap_err("set desired flow")?;
    path.open_gas_end_point(&params.endpoint)
        .wrap_err_with(|| format!("open gas port {port}"))?;
    tracing::info!(
        port,
        desired_flow = params.desired_flow,
        part_number = %params.endpoint.cylinder.part_number,
        "delivery start"
    );

    let mut check = regulator.check_flow(params.regulate_timeout);
    let mut interrupted = false;

    if !check.status.is_terminal() && !params.hold.is_zero() {
        let keeper = FlowKeeper::spawn(regulator.clone(), params.keeper_period, params.keeper_period);
        let clock = path.clock();
        let start = clock.now();
        loop {
            if shutdown.load(Ordering::Relaxed) {
                interrupted = true;
                tracing::warn!(port, "delivery interrupted");
                break;
            }
            if let Some(latest) = keeper.latest() {
                check = latest;
                if check.status.is_terminal() {
                    break;
                }
            }
            let elapsed = clock.now().saturating_duration_since(start);
            if elapsed >= params.hold {
                break;
            }
            clock.sleep((params.hold - elapsed).min(HOLD_POLL));
        }
        drop(keeper);
    }

    let report = DeliveryReport {
        port,
        desired_flow: params.desired_flow,
        status: check.status,
        raw_flow: check.raw_flow,
        raw_vacuum: check.raw_vacuum,
        flow_ml_per_min: path.last_sample().map(|s| s.flow_ml_per_min),
        final_voltage: path.pump_voltage(),
        bad_tubing: path.is_bad_pump_tubing(),
        interrupted,
    };
    path.close_gas_end_point(Some(&params.endpoint));

    match report.status {
        FlowStatus::TooLow | FlowStatus::TooHigh => {
            tracing::error!(port, status = %report.status, "delivery failed to regulate");
        }
        _ => tracing::info!(
            port,
            status = %report.status,
            flow_ml = ?report.flow_ml_per_min,
            voltage = report.final_voltage,
            "delivery complete"
        ),
    }
    Ok(report)
}
