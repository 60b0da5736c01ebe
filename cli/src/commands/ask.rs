// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One guidance turn from the command line

use anyhow::{Context, Result};
use clap::Args;
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use counsel_core::domain::compliance::Verdict;
use counsel_core::domain::events::GuidanceEvent;
use counsel_core::infrastructure::{DomainEvent, EventReceiver};
use counsel_core::{AdvisorService, ConsultationId, CounselConfig, CustomerProfile, GuidanceRequest};

use super::render;

/// How long to wait for a background verdict once the pool is idle
const VERDICT_WAIT: Duration = Duration::from_secs(2);

#[derive(Args)]
pub struct AskArgs {
    /// The customer's question
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    /// Print the answer as it is generated; compliance runs afterwards
    #[arg(long)]
    pub stream: bool,

    #[arg(long, default_value = "cli-customer")]
    pub customer_id: String,

    /// Consultation kind used to label learned cases
    #[arg(long, default_value = "general_guidance")]
    pub task_type: String,
}

pub async fn execute(args: AskArgs, config: CounselConfig) -> Result<()> {
    let service = AdvisorService::from_config(&config)
        .await
        .context("Failed to start advisor service")?;
    let cancel = cancel_on_ctrl_c();

    let request = GuidanceRequest {
        consultation_id: ConsultationId::new(),
        customer: CustomerProfile::new(args.customer_id),
        task_type: args.task_type,
        message: args.message,
    };

    let result = if args.stream {
        stream_turn(&service, request, &cancel).await
    } else {
        answer_turn(&service, &request, &cancel).await
    };

    service.shutdown().await;
    result
}

/// Cancelled when the user presses Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

pub(crate) async fn answer_turn(
    service: &AdvisorService,
    request: &GuidanceRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let reply = service.provide_guidance(request, cancel).await?;
    if let Some(reasoning) = &reply.reasoning {
        tracing::debug!(reasoning = %reasoning, "Advisor reasoning");
    }
    println!("{}", reply.text);
    render::print_reply_summary(&reply);
    Ok(())
}

pub(crate) async fn stream_turn(
    service: &AdvisorService,
    request: GuidanceRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut events = service.event_bus().subscribe_consultation(request.consultation_id);
    let mut fragments = service.provide_guidance_stream(request, cancel.clone()).await?;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        print!("{}", fragment);
        stdout.flush()?;
    }
    println!();

    service.wait_for_background().await;
    match background_verdict(&mut events).await {
        Some(verdict) => {
            println!();
            render::print_verdict(&verdict);
        }
        None => tracing::warn!("No compliance verdict received for streamed answer"),
    }
    Ok(())
}

async fn background_verdict(events: &mut EventReceiver) -> Option<Verdict> {
    loop {
        match events.recv_timeout(VERDICT_WAIT).await {
            Ok(DomainEvent::Guidance(GuidanceEvent::StreamValidationCompleted { verdict, .. })) => return Some(verdict),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
