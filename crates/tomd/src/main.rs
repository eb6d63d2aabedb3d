//! tomd - The tom pomodoro timer process
//!
//! This is the main entry point for tomd.
//! It wires together all the components:
//! - Configuration loading
//! - Logging
//! - Pomodoro engine
//! - Console control (stdin commands, event output)
//! - Signal handling for graceful shutdown

mod render;

use anyhow::{Context, Result, bail};
use clap::Parser;
use render::{Command, HELP, TextRenderer, describe_state};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tom_config::{Settings, load_config};
use tom_core::{EngineEvent, EngineOptions, PomoEngine};
use tom_util::default_config_path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// tomd - Pomodoro work/break timer
#[derive(Parser, Debug)]
#[command(name = "tomd")]
#[command(about = "Pomodoro work/break timer", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/tom/config.toml, or TOM_CONFIG)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print events as JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Start the first work session immediately
    #[arg(long)]
    auto_start: bool,
}

/// How the configuration was obtained, reported once logging is up
enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

/// Main process state
struct Service {
    engine: PomoEngine,
    json: bool,
    renderer: TextRenderer,
}

impl Service {
    fn new(settings: Settings, args: &Args) -> Self {
        let engine = PomoEngine::with_options(
            settings.timer,
            EngineOptions {
                progress_interval: settings.progress_interval,
                ..Default::default()
            },
        );

        Self {
            engine,
            json: args.json,
            renderer: TextRenderer::new(),
        }
    }

    async fn run(mut self, auto_start: bool) -> Result<()> {
        let mut events = self.engine.subscribe();
        self.engine.start().context("Failed to start engine")?;

        if auto_start {
            self.engine.advance().context("Failed to start first session")?;
        } else if !self.json {
            println!("{HELP}");
        }

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("tomd running");

        let mut fault = None;
        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                event = events.recv() => match event {
                    Ok(event) => {
                        self.emit(&event)?;
                        if let EngineEvent::Faulted { message } = event {
                            fault = Some(message);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event output fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },

                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if !self.handle_command(Command::parse(&line)) {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed, no longer reading commands");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin, no longer reading commands");
                        stdin_open = false;
                    }
                },
            }
        }

        info!("Shutting down tomd");
        let stopped = self.engine.stop().await;

        if let Some(message) = fault {
            bail!("Engine stopped on a fault: {message}");
        }
        stopped.context("Engine did not stop cleanly")?;

        info!("Shutdown complete");
        Ok(())
    }

    /// Returns false when the process should exit
    fn handle_command(&self, command: Command) -> bool {
        match command {
            Command::Advance => {
                if let Err(e) = self.engine.advance() {
                    warn!(error = %e, "Advance rejected");
                }
            }
            Command::Status => {
                let status = format!(
                    "{} [{:?}]",
                    describe_state(self.engine.current_state(), self.engine.current_round()),
                    self.engine.status()
                );
                println!("{status}");
            }
            Command::Quit => return false,
            Command::Help => println!("{HELP}"),
            Command::Unknown(other) => println!("unknown command '{other}'; {HELP}"),
        }
        true
    }

    fn emit(&mut self, event: &EngineEvent) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
        } else if let Some(line) = self.renderer.render(event) {
            println!("{line}");
        }
        Ok(())
    }
}

fn load_settings(path: &Path) -> Result<(Settings, ConfigSource)> {
    if !path.exists() {
        return Ok((Settings::default(), ConfigSource::Defaults(path.to_path_buf())));
    }
    let settings = load_config(path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    Ok((settings, ConfigSource::File(path.to_path_buf())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (settings, source) = load_settings(&args.config)?;

    // Initialize logging
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| settings.service.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "tomd starting");

    match &source {
        ConfigSource::File(path) => info!(
            config_path = %path.display(),
            max_rounds = settings.timer.max_rounds(),
            "Configuration loaded"
        ),
        ConfigSource::Defaults(path) => warn!(
            config_path = %path.display(),
            "Config file not found, using defaults"
        ),
    }

    let auto_start = args.auto_start;
    let service = Service::new(settings, &args);
    if let Err(e) = service.run(auto_start).await {
        error!(error = %e, "tomd exited with an error");
        return Err(e);
    }
    Ok(())
}
