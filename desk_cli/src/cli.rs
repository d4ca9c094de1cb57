//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "desk", version, about = "Motorized desk controller")]
pub struct Cli {
    /// Path to config TOML; built-in reference defaults apply when the
    /// file does not exist
    #[arg(long, value_name = "FILE", default_value = "etc/desk.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate against the end-stop, then serve the command API
    Serve {
        /// Listen address override (host:port)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        /// Drive the simulated rig instead of GPIO hardware
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
        /// Control loop rate override in Hz
        #[arg(long, value_name = "HZ")]
        cycle_hz: Option<u32>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck {
        /// Check the simulated rig instead of GPIO hardware
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
    },
}
