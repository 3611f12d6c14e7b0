mod atomic;
mod cli;
mod commands;
mod error_fmt;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::{Result, WrapErr};

use aqua_config::Settings;
use aqua_core::{UpdateCheck, UpdateOutcome};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporting: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if *JSON_MODE.get().unwrap_or(&false) {
                eprintln!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            std::process::exit(error_fmt::exit_code_for_error(&e));
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = load_settings(cli)?;
    init_logging(cli, &settings);
    settings.validate()?;

    match &cli.cmd {
        Commands::Predict {
            reading,
            history,
            pond_id,
            pond_start,
        } => {
            let prediction =
                commands::run_predict(&settings, reading, history.as_ref(), pond_id, *pond_start)?;
            if cli.json {
                println!("{}", commands::prediction_json(&prediction));
            } else {
                println!(
                    "weight: {:.1} g, length: {:.1} cm (model {})",
                    prediction.weight_g, prediction.length_cm, prediction.model_version
                );
                println!("harvest-ready: {}", prediction.harvest_ready_at);
            }
            Ok(0)
        }
        Commands::CheckUpdate => {
            let mgr = commands::build_manager(&settings)?;
            let check = mgr.check_for_update();
            if cli.json {
                let obj = match &check {
                    UpdateCheck::UpToDate => serde_json::json!({"status": "up_to_date"}),
                    UpdateCheck::CandidateAvailable(v) => {
                        serde_json::json!({"status": "candidate_available", "version": v})
                    }
                    UpdateCheck::CheckFailed(reason) => {
                        serde_json::json!({"status": "check_failed", "reason": reason})
                    }
                };
                println!("{obj}");
            } else {
                match &check {
                    UpdateCheck::UpToDate => println!("up to date"),
                    UpdateCheck::CandidateAvailable(v) => println!("candidate available: {v}"),
                    UpdateCheck::CheckFailed(reason) => println!("check failed: {reason}"),
                }
            }
            Ok(match check {
                UpdateCheck::CheckFailed(_) => 2,
                _ => 0,
            })
        }
        Commands::ApplyUpdate => {
            let outcome = commands::run_apply_update(&settings)?;
            if cli.json {
                let obj = match &outcome {
                    UpdateOutcome::Applied(v) => {
                        serde_json::json!({"status": "applied", "version": v})
                    }
                    UpdateOutcome::Rejected(reason) => {
                        serde_json::json!({"status": "rejected", "reason": reason})
                    }
                    UpdateOutcome::Unchanged => serde_json::json!({"status": "unchanged"}),
                };
                println!("{obj}");
            } else {
                match &outcome {
                    UpdateOutcome::Applied(v) => println!("applied {v}"),
                    UpdateOutcome::Rejected(reason) => println!("rejected: {reason}"),
                    UpdateOutcome::Unchanged => println!("unchanged"),
                }
            }
            Ok(match outcome {
                UpdateOutcome::Rejected(_) => 2,
                _ => 0,
            })
        }
        Commands::SelfCheck => {
            let mgr = commands::build_manager(&settings)?;
            let version = mgr
                .active_version()
                .ok_or_else(|| eyre::eyre!("no active pair after bootstrap"))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"status": "ok", "active_version": version})
                );
            } else {
                println!("ok (active pair {version})");
            }
            Ok(0)
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    if cli.config.exists() {
        let text = std::fs::read_to_string(&cli.config)
            .wrap_err_with(|| format!("read settings {}", cli.config.display()))?;
        let settings = toml::from_str::<Settings>(&text)
            .wrap_err_with(|| format!("parse settings {}", cli.config.display()))?;
        Ok(settings)
    } else {
        Ok(Settings::default())
    }
}

fn init_logging(cli: &Cli, settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    // An explicit --log-level wins over the settings file.
    let level = if cli.log_level != "info" {
        cli.log_level.clone()
    } else {
        settings
            .logging
            .level
            .clone()
            .unwrap_or_else(|| cli.log_level.clone())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(file) = &settings.logging.file {
        let path = std::path::Path::new(file);
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "aqua.log".to_string());
        let appender = match settings.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(writer)
            .init();
    } else if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
