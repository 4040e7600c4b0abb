//! Neural - Local Translation Orchestrator
//!
//! Command line entry point: one-shot translation, an interactive session fed
//! by stdin, the clipboard and SIGUSR1, engine health probes and history
//! management.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use neural::cli::{Args, Commands, ConfigAction, HistoryAction};
use neural::config::Config;
use neural::engine::create_http_client;
use neural::engine::ollama::OllamaEngine;
use neural::history::JsonHistoryStore;
use neural::language::Language;
use neural::session::{format_state, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = Config::discover(args.config.as_deref())?;

    match args.command {
        Commands::Translate { text, from, to, engine } => {
            if let Some(from) = from {
                config.preferences.source = from.parse()?;
            }
            if let Some(to) = to {
                config.preferences.target = to.parse()?;
            }
            if let Some(engine) = engine {
                config.preferences.preferred_engine = engine.parse()?;
            }

            let session = Session::new(config)?;
            let state = session.translate_once(&text.join(" ")).await;
            println!("{}", format_state(&state));
            if state.error_message.is_some() {
                std::process::exit(1);
            }
        }
        Commands::Improve { text, language, engine } => {
            let language = language.map(|l| l.parse::<Language>()).transpose()?;
            if let Some(engine) = engine {
                config.preferences.preferred_engine = engine.parse()?;
            }

            let session = Session::new(config)?;
            match session.improve_once(&text.join(" "), language).await {
                Ok(output) => {
                    info!("Improved with {} in {}ms", output.engine, output.latency.as_millis());
                    println!("{}", output.value);
                }
                Err(e) => {
                    eprintln!("error: {}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Models => {
            let client = create_http_client(&config.engines)?;
            let ollama = OllamaEngine::new(config.engines.ollama.clone(), client);
            let installed = match ollama.available_models().await {
                Ok(models) => Some(models),
                Err(e) => {
                    warn!("Cannot list installed Ollama models: {}", e);
                    None
                }
            };

            println!("{:<4} {:<28} {:<10}", "#", "Model", "Status");
            println!("{}", "-".repeat(44));
            for (rank, model) in config.engines.ollama.models.iter().enumerate() {
                let status = match &installed {
                    Some(models) if models.contains(model) => "installed",
                    Some(_) => "missing",
                    None => "unknown",
                };
                println!("{:<4} {:<28} {:<10}", rank + 1, model, status);
            }
        }
        Commands::Interactive { auto } => {
            let session = Session::new(config)?;
            println!("Type text to translate. Commands: :swap :auto on|off :from LANG :to LANG :copy :quit");

            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session.run_interactive(stdin, auto, shortcut_signals()?).await?;
        }
        Commands::Health => {
            let session = Session::new(config.clone())?;
            let snapshot = session.gateway().refresh_health().await;

            println!("{:<14} {:<40} {:<10}", "Engine", "Endpoint", "Status");
            println!("{}", "-".repeat(64));
            for (name, endpoint, healthy) in [
                ("accelerated", &config.engines.accelerated.endpoint, snapshot.accelerated),
                ("ollama", &config.engines.ollama.endpoint, snapshot.ollama),
            ] {
                println!("{:<14} {:<40} {:<10}", name, endpoint, if healthy { "healthy" } else { "unavailable" });
            }
        }
        Commands::History { action } => {
            let store = JsonHistoryStore::from_config(&config.history);
            match action {
                HistoryAction::List { limit } => {
                    let entries = store.load(Some(limit)).await?;
                    if entries.is_empty() {
                        println!("No translation history.");
                    }
                    for entry in entries {
                        println!(
                            "{} [{} -> {} | {}] {} => {}",
                            format_timestamp(entry.timestamp),
                            entry.from_language.code(),
                            entry.to_language.code(),
                            entry.engine,
                            entry.source_text,
                            entry.translated_text
                        );
                    }
                }
                HistoryAction::Clear => {
                    store.clear().await?;
                    println!("Translation history cleared.");
                }
                HistoryAction::Stats => {
                    let stats = store.stats().await?;
                    println!("File:         {}", store.path().display());
                    println!("Translations: {}", stats.total_translations);
                    if let Some(created) = stats.created_at {
                        println!("Created:      {}", format_timestamp(created));
                    }
                    if let Some(updated) = stats.updated_at {
                        println!("Updated:      {}", format_timestamp(updated));
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path } => {
                let path = match path {
                    Some(path) => path,
                    None => Config::user_config_path().context("Cannot determine the user config directory")?,
                };
                if path.exists() {
                    bail!("Configuration already exists at {}", path.display());
                }
                Config::default().save_to_file(&path)?;
                println!("Wrote default configuration to {}", path.display());
            }
        },
    }

    Ok(())
}

/// SIGUSR1 acts as the global translate shortcut
#[cfg(unix)]
fn shortcut_signals() -> Result<Option<mpsc::Receiver<()>>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1())?;
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    info!("Send SIGUSR1 to pid {} to translate the clipboard", std::process::id());
    Ok(Some(rx))
}

#[cfg(not(unix))]
fn shortcut_signals() -> Result<Option<mpsc::Receiver<()>>> {
    Ok(None)
}

fn log_directory() -> Result<PathBuf> {
    match dirs::data_dir() {
        Some(dir) => Ok(dir.join("neural").join("log")),
        None => Ok(std::env::current_dir()?.join(".neural").join("log")),
    }
}

/// Setup logging to both stderr and a daily rolling file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "neural.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::WARN };

    // stdout carries translations, so the console layer writes to stderr
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}", log_level, log_dir.join("neural.log").display());

    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
