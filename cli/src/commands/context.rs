// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inspect retrieval: what the advisor would see for a question

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use counsel_core::{AdvisorService, CounselConfig};

use super::render;

#[derive(Args)]
pub struct ContextArgs {
    /// Question to retrieve context for
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Dump the full scored records instead of the summary
    #[arg(long)]
    pub raw: bool,
}

pub async fn execute(args: ContextArgs, config: CounselConfig) -> Result<()> {
    let service = AdvisorService::from_config(&config)
        .await
        .context("Failed to start advisor service")?;

    let knowledge = service.knowledge();
    println!(
        "{}",
        format!(
            "Knowledge base: {} memories, {} cases, {} rules",
            knowledge.memories.len(),
            knowledge.cases.len(),
            knowledge.rules.len()
        )
        .dimmed()
    );

    let context = service.retrieve_context(&args.query).await?;
    if args.raw {
        println!("{:#?}", context);
    } else {
        render::print_context(&context);
    }

    service.shutdown().await;
    Ok(())
}
