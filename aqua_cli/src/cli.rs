//! CLI argument definitions and shared statics.

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "aqua", version, about = "Pond inference CLI")]
pub struct Cli {
    /// Path to settings TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/aqua_settings.toml")]
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
    /// Run one prediction for a pond reading
    Predict {
        /// Reading JSON file (sensor fields + recorded_at; missing sensor
        /// fields are imputed)
        #[arg(long, value_name = "FILE")]
        reading: PathBuf,
        /// Optional history CSV with strict headers
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,
        /// Pond identifier
        #[arg(long, value_name = "ID")]
        pond_id: String,
        /// Pond stocking date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        pond_start: NaiveDate,
    },
    /// Compare the installed pair version against the update source
    CheckUpdate,
    /// Download, validate, persist, and activate the update-source pair
    ApplyUpdate,
    /// Quick health check (artifacts load, config resolves)
    SelfCheck,
}
