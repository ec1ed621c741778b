//! `covr-cli` – runs one simulated CoVR session.
//!
//! ```text
//! covr [CONFIG] [--json]      run the session described by CONFIG (default covr.toml)
//! covr --init <PATH>          write the built-in demo session to PATH
//! ```
//!
//! The binary:
//!
//! 1. Loads the session file, falling back to the built-in demo when it does
//!    not exist, and applies `COVR_*` environment overrides.
//! 2. Builds the simulated column, planner and tracker around an
//!    `InteractionLoop` and issues the configured hint.
//! 3. Ticks until the scripted lift-and-replace completes, the tick budget
//!    runs out or **Ctrl-C** is pressed.
//! 4. Prints a coloured summary, or a JSON report with `--json`.

mod config;
mod scenario;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::{error, info, warn};

use crate::config::CliConfig;
use crate::scenario::{Rig, Summary};

const DEFAULT_CONFIG: &str = "covr.toml";

#[derive(Debug, PartialEq)]
enum Command {
    Run { config: PathBuf, json: bool },
    Init { path: PathBuf },
    Help,
}

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); COVR_LOG_FORMAT=json switches to
    // newline-delimited JSON; OTEL_EXPORTER_OTLP_ENDPOINT exports spans.
    let _telemetry = covr_runtime::init_tracing("covr");

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}: {}", "Usage error".red(), e);
            print_usage();
            return ExitCode::from(2);
        }
    };

    match command {
        Command::Help => {
            print_usage();
            ExitCode::SUCCESS
        }
        Command::Init { path } => match config::save_to(&CliConfig::demo(), &path) {
            Ok(()) => {
                println!(
                    "  {} Session written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        },
        Command::Run { config, json } => run(&config, json),
    }
}

fn run(path: &Path, json: bool) -> ExitCode {
    if !json {
        print_banner();
    }

    let cfg = match config::load_from(path) {
        Ok(Some(cfg)) => {
            if !json {
                println!("  Session loaded from {}", path.display().to_string().bold());
            }
            cfg
        }
        Ok(None) => {
            if !json {
                println!(
                    "  {} not found, running the built-in demo session.",
                    path.display().to_string().bold()
                );
            }
            let mut cfg = CliConfig::demo();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.validate() {
        eprintln!("{}: {}", "Config error".red(), e);
        return ExitCode::FAILURE;
    }

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping the session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the session can only end on its own");
    }

    let mut rig = match Rig::build(&cfg) {
        Ok(rig) => rig,
        Err(e) => {
            error!(error = %e, "failed to build the simulation rig");
            eprintln!("{}: {}", "Setup error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let summary = rig.run(cfg.sim.ticks, cfg.sim.dt, &shutdown);
    info!(
        ticks = rig.session().ticks(),
        halted = rig.session().is_halted(),
        "session ended"
    );

    if json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("{}: {}", "Report error".red(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&summary);
    }

    if summary.halted.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut config = None;
    let mut json = false;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--json" => json = true,
            "--init" => {
                let path = args.next().ok_or("--init needs a path")?;
                return Ok(Command::Init {
                    path: PathBuf::from(path),
                });
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option '{flag}'")),
            _ if config.is_some() => return Err(format!("unexpected argument '{arg}'")),
            _ => config = Some(PathBuf::from(&arg)),
        }
    }
    Ok(Command::Run {
        config: config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG)),
        json,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______      _    ______ "#.bold().cyan());
    println!("{}", r#"  / ____/___  | |  / / __ \"#.bold().cyan());
    println!("{}", r#" / /   / __ \ | | / / /_/ /"#.bold().cyan());
    println!("{}", r#"/ /___/ /_/ / | |/ / _, _/ "#.bold().cyan());
    println!("{}", r#"\____/\____/  |___/_/ |_|  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "CoVR".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Physical proxy session simulator");
    println!();
}

fn print_usage() {
    println!("Usage:");
    println!("  covr [CONFIG] [--json]   run a session (default {DEFAULT_CONFIG})");
    println!("  covr --init <PATH>       write the demo session to PATH");
}

fn print_summary(summary: &Summary) {
    println!();
    let status = if let Some(reason) = &summary.halted {
        format!("halted: {reason}").red().bold()
    } else if summary.interrupted {
        "interrupted".yellow().bold()
    } else if summary.finished {
        "finished".green().bold()
    } else {
        "tick budget exhausted".yellow()
    };
    println!("  Session {status}");
    println!(
        "  {} ticks, {:.2} s simulated, {} arrival(s)",
        summary.ticks, summary.elapsed_secs, summary.arrivals
    );
    let c = summary.column;
    println!("  Column at ({:.2}, {:.2}, {:.2})", c.x, c.y, c.z);
    if let Some(target) = &summary.target {
        println!(
            "  Target ({:.2}, {:.2}) via {}",
            target.position.x,
            target.position.z,
            format!("{:?}", target.source).dimmed()
        );
    }

    if !summary.events.is_empty() {
        println!();
        println!("  {}", "Grab events".bold());
        for e in &summary.events {
            println!("    • tick {:>5}  {}  {:?}", e.tick, e.prop.bold(), e.transition);
        }
    }

    println!();
    println!("  {}", "Objects of interest".bold());
    for (w, h) in summary.weights.iter().zip(&summary.highlights) {
        let name = if w.active {
            w.name.normal()
        } else {
            w.name.dimmed()
        };
        println!(
            "    • {:<12} {:<8} weight {:.3}  {}",
            name,
            w.category.to_string(),
            w.weight,
            format!("{:?}", h.highlight).cyan()
        );
    }
    println!();
}
