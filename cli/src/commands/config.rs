// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use counsel_core::domain::config::{StoreBackend, CONFIG_PATH_ENV};
use counsel_core::CounselConfig;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./counsel-config.yaml")]
        output: PathBuf,

        /// Include every section with comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(output, examples, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = CounselConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./counsel-config.yaml");
        println!("  4. ~/.counsel/config.yaml");
        println!("  5. /etc/counsel/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Configuration:".bold(), config.metadata.name);
    println!();

    println!("{}", "LLM Providers:".bold());
    if spec.llm_providers.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for provider in &spec.llm_providers {
        let state = if provider.enabled { "".normal() } else { " [disabled]".dimmed() };
        println!("  {} ({:?}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        for model in &provider.models {
            println!("      - {} → {}", model.alias, model.model);
        }
    }
    println!();

    println!("{}", "LLM Selection:".bold());
    println!("  Default model: {}", spec.llm_selection.default_model);
    if let Some(fallback) = &spec.llm_selection.fallback_provider {
        println!("  Fallback provider: {}", fallback);
    }
    println!(
        "  Retries: {} (base delay {}ms)",
        spec.llm_selection.max_retries, spec.llm_selection.retry_delay_ms
    );
    println!();

    println!("{}", "Knowledge:".bold());
    println!(
        "  Embedding: {:?}, {} dimensions{}",
        spec.embedding.backend,
        spec.embedding.dimensions,
        spec.embedding
            .model
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default()
    );
    match spec.persistence.backend {
        StoreBackend::Memory => println!("  Persistence: in-memory"),
        StoreBackend::File => println!("  Persistence: files under {}", spec.persistence.data_dir().display()),
    }
    println!(
        "  Half-life: {}h, top-k memories/cases/rules: {}/{}/{}",
        spec.retrieval.half_life_hours,
        spec.retrieval.memory_top_k,
        spec.retrieval.case_top_k,
        spec.retrieval.rule_top_k
    );
    println!();

    println!("{}", "Guidance:".bold());
    println!(
        "  Compliance thresholds: pass {} / borderline {}",
        spec.compliance.pass_threshold, spec.compliance.borderline_threshold
    );
    println!("  Chain of thought: {}", spec.orchestration.chain_of_thought);
    println!(
        "  Temperature: {} (strengthen {})",
        spec.orchestration.temperature,
        spec.orchestration.strengthen_temperature()
    );
    println!("  Validation workers: {}", spec.orchestration.validation_workers);
    println!("  Learning rate: {}", spec.learning.learning_rate);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CounselConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

pub fn sample(with_examples: bool) -> &'static str {
    if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    }
}

fn generate(output: PathBuf, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    std::fs::write(&output, sample(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());
    Ok(())
}
