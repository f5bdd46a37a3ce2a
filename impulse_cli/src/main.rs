#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `impulse`: drive an impulse cover from the command line.

mod cli;
mod drive;
mod error_fmt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use drive::Printer;
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use impulse_config::Config;
use impulse_core::CoverCommand;
use impulse_core::error::CoverError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre install failed: {e}");
    }

    if let Err(err) = run(&cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        if json {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: &Cli) -> eyre::Result<()> {
    let cfg = impulse_config::load_file(&cli.config)
        .map_err(|e| eyre::Report::new(CoverError::Config(format!("{e}"))))?;
    init_tracing(cli, &cfg)?;
    for w in cfg.warnings() {
        tracing::warn!("{w}");
    }
    tracing::info!("{}", cfg.summary());

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let printer = Printer { json: cli.json };
    let sim = cli.simulated_time;
    let once = |cmd: CoverCommand| drive::run_once(&cfg, sim, printer, cmd, &shutdown);
    match &cli.cmd {
        Commands::Open => once(CoverCommand::Open),
        Commands::Close => once(CoverCommand::Close),
        Commands::Stop => once(CoverCommand::Stop),
        Commands::Toggle => once(CoverCommand::Toggle),
        Commands::Position { target } => once(CoverCommand::Position(*target)),
        Commands::Run => drive::run_interactive(&cfg, sim, printer, &shutdown),
        Commands::SelfCheck => drive::self_check(&cfg, sim, printer),
        Commands::Health => drive::health(&cfg, sim, printer),
        Commands::DumpConfig => {
            drive::dump_config(&cfg, printer);
            Ok(())
        }
    }
}

/// Console logs go to stderr so stdout stays machine-readable.
fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| eyre::eyre!("invalid log level {level:?}: {e}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if cli.json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    if let Some(path) = cfg.logging.file.as_deref() {
        let path = std::path::Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
        let appender = match cfg.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}
