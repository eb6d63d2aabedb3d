//! Config validation CLI tool
//!
//! Validates a tom configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use tom_util::{default_config_path, format_countdown};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a tom configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match tom_config::load_config(&config_path) {
        Ok(settings) => {
            let timer = &settings.timer;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", tom_config::CURRENT_CONFIG_VERSION);
            println!("  Rounds per long break: {}", timer.max_rounds());
            println!("  Work: {}", format_countdown(timer.work_duration()));
            println!("  Short break: {}", format_countdown(timer.short_break_duration()));
            println!("  Long break: {}", format_countdown(timer.long_break_duration()));
            println!("  Full cycle: {}", format_countdown(timer.cycle_duration()));
            println!("  Progress interval: {:?}", settings.progress_interval);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                tom_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                tom_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                tom_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                tom_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        tom_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
