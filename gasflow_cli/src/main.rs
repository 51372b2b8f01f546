#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod sim;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, JSON_MODE};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error handler: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let mut guard = None;
    let result = run(cli, &mut guard);
    // Flush the file sink before a possible process::exit.
    drop(guard);

    if let Err(err) = result {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run(cli: Cli, guard: &mut Option<WorkerGuard>) -> eyre::Result<()> {
    let cfg = gasflow_config::load_file(&cli.config)?;
    *guard = init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, hardware = ?cfg.station.hardware, "config loaded");

    match cli.cmd {
        Commands::Deliver {
            port,
            flow,
            seconds,
            timeout_ms,
            recheck_ms,
        } => commands::deliver(
            &cfg,
            &commands::DeliverArgs {
                port,
                flow,
                seconds,
                timeout_ms,
                recheck_ms,
            },
            cli.json,
        ),
        Commands::Relieve => commands::relieve(&cfg, cli.json),
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console logs go to stderr so stdout stays machine-readable. The optional
/// `[logging] file` sink always writes JSON lines.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &gasflow_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let console: BoxedLayer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };
    let mut layers: Vec<BoxedLayer> = vec![console.with_filter(filter).boxed()];

    let mut guard = None;
    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let Some(name) = path.file_name() else {
            eyre::bail!("logging.file {file:?} has no file name");
        };
        let rotation = match logging.rotation.as_deref().unwrap_or("never") {
            "never" => Rotation::NEVER,
            "daily" => Rotation::DAILY,
            "hourly" => Rotation::HOURLY,
            other => eyre::bail!("logging.rotation must be never|daily|hourly, got {other:?}"),
        };
        let appender = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(name.to_string_lossy().into_owned())
            .build(dir)?;
        let (writer, g) = tracing_appender::non_blocking(appender);
        guard = Some(g);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(guard)
}
