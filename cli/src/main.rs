// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Counsel CLI
//!
//! The `counsel` binary runs the guidance core in-process against the
//! configured LLM providers and knowledge store.
//!
//! ## Commands
//!
//! - `counsel config show|validate|generate` - Configuration management
//! - `counsel context <QUERY>` - Show what retrieval surfaces for a question
//! - `counsel ask <MESSAGE>` - One guidance turn, optionally streamed
//! - `counsel chat` - Interactive consultation, ending with an outcome

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use counsel::commands::{self, AskArgs, ChatArgs, ConfigCommand, ContextArgs};
use counsel_core::domain::config::{LogFormat, LoggingConfig};
use counsel_core::CounselConfig;

/// Counsel - compliance-checked financial guidance
#[derive(Parser)]
#[command(name = "counsel")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "COUNSEL_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "COUNSEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format; defaults to the config file
    #[arg(long, global = true, value_parser = ["text", "json"])]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Retrieve memories, cases and rules for a question
    #[command(name = "context")]
    Context(ContextArgs),

    /// Ask a single question
    #[command(name = "ask")]
    Ask(AskArgs),

    /// Hold an interactive consultation
    #[command(name = "chat")]
    Chat(ChatArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // A broken config file must not stop `config validate` from reporting it
    let loaded = CounselConfig::load_or_default(cli.config.clone());
    let logging = loaded
        .as_ref()
        .map(|c| c.spec.observability.logging.clone())
        .unwrap_or_default();
    init_logging(&logging, cli.log_level.as_deref(), cli.log_format.as_deref())?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Context(args)) => commands::context::execute(args, loaded?).await,
        Some(Commands::Ask(args)) => commands::ask::execute(args, loaded?).await,
        Some(Commands::Chat(args)) => commands::chat::execute(args, loaded?).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(config: &LoggingConfig, level: Option<&str>, format: Option<&str>) -> Result<()> {
    let level = level.unwrap_or(&config.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let format = match format {
        Some("json") => LogFormat::Json,
        Some(_) => LogFormat::Text,
        None => config.format,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }

    Ok(())
}
