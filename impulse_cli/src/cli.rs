//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "impulse", version, about = "Impulse cover controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/impulse_cover.toml")]
    pub config: PathBuf,

    /// Log and print as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins,
    /// then this flag, then `[logging] level`, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Drive the simulated gate on a manual clock that advances as fast as
    /// the loop runs instead of in real time
    #[arg(long, action = ArgAction::SetTrue)]
    pub simulated_time: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the cover and wait until it settles
    Open,
    /// Close the cover and wait until it settles
    Close,
    /// Stop the cover
    Stop,
    /// Stop when moving, otherwise head for the farther end
    Toggle,
    /// Move to a position between 0.0 (closed) and 1.0 (open)
    Position {
        #[arg(long, value_name = "F")]
        target: f32,
    },
    /// Read commands from stdin, one per line, until `quit` or EOF
    Run,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
    /// Health check for operational monitoring
    Health,
    /// Print the effective configuration
    DumpConfig,
}
