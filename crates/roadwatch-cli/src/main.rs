//! `roadwatch` – gateway command line
//!
//! ```text
//! roadwatch replay <scenario.toml> [--config <path>]
//! roadwatch run [--config <path>]
//! ```
//!
//! - **replay** plays a scripted scenario against a fresh gateway in
//!   simulated time and prints every indicator command it produced.
//! - **run** is live mode: JSON lines on stdin (`{"type": "sensor", ...}`,
//!   `{"type": "position", ...}`, `{"type": "ack", ...}`) are fed to the
//!   async driver in real time.  Ctrl-C or end of input shuts it down.

mod config;
mod scenario;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use roadwatch_runtime::{Gateway, Inbound};
use roadwatch_types::{AckEvent, AlertLevel, IndicatorCommand, PositionConfig, SensorEvent};

// ─────────────────────────────────────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Replay { scenario: PathBuf, config: Option<PathBuf> },
    Run { config: Option<PathBuf> },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut positional = Vec::new();
    let mut config = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            value => positional.push(value),
        }
    }

    match positional.as_slice() {
        [] | ["help"] => Ok(Command::Help),
        ["replay", scenario] => Ok(Command::Replay { scenario: PathBuf::from(scenario), config }),
        ["replay"] => Err("replay needs a scenario file".to_string()),
        ["run"] => Ok(Command::Run { config }),
        [other, ..] => Err(format!("unknown command {other}")),
    }
}

fn print_usage() {
    println!("{}", "roadwatch – wildlife detection gateway".bold().cyan());
    println!();
    println!("  {} <scenario.toml> [--config <path>]", "roadwatch replay".bold());
    println!("  {} [--config <path>]", "roadwatch run".bold());
    println!();
    println!("  Configuration defaults to {} when present.", config::DEFAULT_CONFIG_FILE.bold());
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let _guard = roadwatch_runtime::init_tracing("roadwatch");
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match parse_args(&args) {
        Ok(Command::Help) => {
            print_usage();
            Ok(())
        }
        Ok(Command::Replay { scenario, config }) => run_replay(&scenario, config.as_deref()),
        Ok(Command::Run { config }) => run_live(config.as_deref()),
        Err(e) => {
            println!("{}: {}", "Usage error".red(), e);
            print_usage();
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn build_gateway(config_path: Option<&std::path::Path>) -> Result<Gateway, String> {
    let cfg = config::resolve(config_path)?;
    Gateway::new(cfg.algorithm, cfg.gateway).map_err(|e| e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// replay
// ─────────────────────────────────────────────────────────────────────────────

fn run_replay(path: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<(), String> {
    let scenario = scenario::Scenario::load(path)?;
    let mut gateway = build_gateway(config_path)?;
    println!(
        "  Replaying {} ({} steps, {} s simulated)",
        path.display().to_string().bold(),
        scenario.steps.len(),
        scenario.duration_s()
    );

    let timeline = scenario::replay(&scenario, &mut gateway).map_err(|e| e.to_string())?;
    for entry in &timeline {
        println!("  {:>6}  {}", format!("{}s", entry.second).dimmed(), describe(&entry.command));
    }
    println!(
        "\n  {} {} command(s), {} node(s) provisioned",
        "✓".green().bold(),
        timeline.len(),
        gateway.topology().count_valid()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// run (live)
// ─────────────────────────────────────────────────────────────────────────────

/// One line of live input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LiveMessage {
    Sensor(SensorEvent),
    Position(PositionConfig),
    Ack(AckEvent),
}

impl From<LiveMessage> for Inbound {
    fn from(msg: LiveMessage) -> Self {
        match msg {
            LiveMessage::Sensor(e) => Inbound::Sensor(e),
            LiveMessage::Position(p) => Inbound::Position(p),
            LiveMessage::Ack(a) => Inbound::Ack(a),
        }
    }
}

fn run_live(config_path: Option<&std::path::Path>) -> Result<(), String> {
    let gateway = build_gateway(config_path)?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start runtime: {e}"))?;

    let (tx, rx) = mpsc::channel::<Inbound>(256);
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<IndicatorCommand>();

    let ctrlc_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting the gateway down …".yellow().bold());
        let _ = ctrlc_tx.blocking_send(Inbound::Shutdown);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use end of input to stop");
    }

    // stdin is blocking; read it on a plain thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LiveMessage>(&line) {
                Ok(msg) => {
                    if tx.blocking_send(msg.into()).is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring malformed input line"),
            }
        }
        let _ = tx.blocking_send(Inbound::Shutdown);
    });

    runtime.block_on(async move {
        let printer = tokio::spawn(async move {
            while let Some(command) = cmd_rx.recv().await {
                println!("  {}", describe(&command));
            }
        });
        let result = roadwatch_runtime::run(gateway, rx, cmd_tx).await;
        let _ = printer.await;
        match result {
            Ok(gw) => {
                info!(nodes = gw.topology().count_valid(), "gateway stopped cleanly");
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn describe(command: &IndicatorCommand) -> String {
    let level = match command.level {
        AlertLevel::Idle => "idle".dimmed(),
        AlertLevel::Concern => "CONCERN".yellow().bold(),
        AlertLevel::Alarm => "ALARM".red().bold(),
    };
    let frame = frame_hex(command);
    format!(
        "node {:>3} → {:<8} ({:?} {:?})  frame {}",
        command.node_id,
        level,
        command.function,
        command.colour,
        frame.dimmed()
    )
}

fn frame_hex(command: &IndicatorCommand) -> String {
    roadwatch_middleware::codec::mesh_indicator_frame(command)
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
