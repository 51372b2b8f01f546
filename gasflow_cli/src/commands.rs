//! Subcommand implementations against the simulated manifold.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use gasflow_config::Config;
use gasflow_core::{
    Cylinder, DeliveryParams, DeliveryReport, FlowRegulator, GasEndPoint, GasPathBuilder,
    GasPathController, STANDARD_FLOW_RATE,
};
use gasflow_hardware::{PortCall, RecordingPort, SimulatedManifold};
use gasflow_traits::HardwarePort;

use crate::sim::manifold_from_config;

fn build_path<P: HardwarePort>(port: P, cfg: &Config) -> eyre::Result<GasPathController<P>> {
    GasPathBuilder::new()
        .with_port(port)
        .with_config(cfg)
        .build()
        .wrap_err("build gas path")
}

pub struct DeliverArgs {
    pub port: u8,
    pub flow: i32,
    pub seconds: u64,
    pub timeout_ms: u64,
    pub recheck_ms: u64,
}

pub fn deliver(cfg: &Config, args: &DeliverArgs, json: bool) -> eyre::Result<()> {
    let path = Arc::new(build_path(manifold_from_config(cfg), cfg)?);
    let regulator = FlowRegulator::new(path);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install Ctrl-C handler")?;

    // Unlisted ports are treated as open to ambient air.
    let endpoint = cfg.port(args.port).map_or_else(
        || GasEndPoint::new(args.port, Cylinder::fresh_air()),
        GasEndPoint::from,
    );
    let params = DeliveryParams {
        endpoint,
        desired_flow: args.flow,
        hold: Duration::from_secs(args.seconds),
        regulate_timeout: (args.timeout_ms > 0).then(|| Duration::from_millis(args.timeout_ms)),
        keeper_period: Duration::from_millis(args.recheck_ms.max(1)),
    };

    let report = gasflow_core::deliver(&regulator, &params, &shutdown)?;
    print_report(&report, json);
    report.into_result()?;
    Ok(())
}

fn print_report(r: &DeliveryReport, json: bool) {
    if json {
        let obj = serde_json::json!({
            "port": r.port,
            "desired_flow": r.desired_flow,
            "status": r.status.name(),
            "flow_ml_per_min": r.flow_ml_per_min,
            "raw_flow": r.raw_flow,
            "raw_vacuum": r.raw_vacuum,
            "pump_voltage": r.final_voltage,
            "bad_tubing": r.bad_tubing,
            "interrupted": r.interrupted,
        });
        println!("{obj}");
        return;
    }
    let flow = r
        .flow_ml_per_min
        .map_or_else(|| "n/a".to_string(), |f| format!("{f} mL/min"));
    println!(
        "port {}: {} at {} (target {} mL/min), pump voltage {}",
        r.port, r.status, flow, r.desired_flow, r.final_voltage
    );
    if r.bad_tubing {
        println!("warning: pump tubing may be damaged");
    }
    if r.interrupted {
        println!("interrupted before the hold time elapsed");
    }
}

pub fn relieve(cfg: &Config, json: bool) -> eyre::Result<()> {
    let path = build_path(manifold_from_config(cfg), cfg)?;
    path.relieve_internal_pressure();
    if json {
        println!("{}", serde_json::json!({ "relieved": true }));
    } else {
        println!("internal pressure relieved");
    }
    Ok(())
}

/// Open port 1 on a recording simulator, take one regulated reading, close,
/// and verify the valve/pump ordering from the call trace.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let port: RecordingPort<SimulatedManifold> = RecordingPort::new(manifold_from_config(cfg));
    let log = port.log();
    let path = Arc::new(build_path(port, cfg)?);
    let regulator = FlowRegulator::new(path.clone());

    let endpoint = GasEndPoint::new(1, Cylinder::fresh_air());
    path.set_desired_flow(STANDARD_FLOW_RATE)?;
    path.open_gas_end_point(&endpoint).wrap_err("self-check open")?;
    let check = regulator.check_flow(Some(Duration::from_millis(1)));
    path.close_gas_end_point(Some(&endpoint));

    let valve_open = log.position(|c| *c == PortCall::Solenoid { port: 1, open: true });
    let pump_on = log.position(|c| *c == PortCall::PumpState(true));
    let pump_off = log.position(|c| *c == PortCall::PumpState(false));
    let valve_close = log.position(|c| *c == PortCall::Solenoid { port: 1, open: false });
    let reads = log.calls().iter().filter(|c| **c == PortCall::ReadFlow).count();

    match (valve_open, pump_on, pump_off, valve_close) {
        (Some(vo), Some(on), Some(off), Some(vc)) if vo < on && off < vc => {}
        _ => eyre::bail!("self-check: unexpected valve/pump ordering {:?}", log.commands()),
    }
    if reads == 0 {
        eyre::bail!("self-check: flow sensor was never read");
    }
    if path.is_pump_running() || path.get_open_valve_position() != 0 {
        eyre::bail!("self-check: gas path still open after close");
    }

    tracing::info!(reads, status = %check.status, "self-check passed");
    if json {
        println!(
            "{}",
            serde_json::json!({ "ok": true, "flow_reads": reads, "status": check.status.name() })
        );
    } else {
        println!("self-check ok ({reads} flow reads, last status {})", check.status);
    }
    Ok(())
}
