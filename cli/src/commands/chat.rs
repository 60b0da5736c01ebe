// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Interactive consultation
//!
//! Each line is a customer message. The session ends with `/outcome`, which
//! closes the consultation and runs the learning loop, or `/quit`, which
//! leaves it unrecorded.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use counsel_core::{AdvisorService, ConsultationId, ConsultationOutcome, CounselConfig, CustomerProfile, GuidanceRequest};

use super::ask::{answer_turn, cancel_on_ctrl_c, stream_turn};
use super::render;

const SUCCESS_DEFAULT_SCORE: f64 = 0.8;
const FAILURE_DEFAULT_SCORE: f64 = 0.3;

const HELP: &str = "\
Type a message to ask the advisor.
  /outcome success|failure [satisfaction comprehension goal_alignment quality]
  /help
  /quit";

#[derive(Args)]
pub struct ChatArgs {
    /// Print answers as they are generated
    #[arg(long)]
    pub stream: bool,

    #[arg(long, default_value = "cli-customer")]
    pub customer_id: String,

    /// Consultation kind used to label learned cases
    #[arg(long, default_value = "general_guidance")]
    pub task_type: String,
}

#[derive(Debug, PartialEq)]
pub enum ChatInput {
    Empty,
    Message(String),
    Outcome(ConsultationOutcome),
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<ChatInput> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatInput::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ChatInput::Message(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("quit") | Some("exit") => Ok(ChatInput::Quit),
        Some("help") => Ok(ChatInput::Help),
        Some("outcome") => {
            let successful = match parts.next() {
                Some("success") => true,
                Some("failure") => false,
                other => anyhow::bail!("expected success or failure, got {:?}", other),
            };
            let scores = parts
                .map(|p| {
                    let value: f64 = p.parse().with_context(|| format!("invalid score '{}'", p))?;
                    if !(0.0..=1.0).contains(&value) {
                        anyhow::bail!("score {} must lie in [0, 1]", value);
                    }
                    Ok(value)
                })
                .collect::<Result<Vec<_>>>()?;

            let default = if successful { SUCCESS_DEFAULT_SCORE } else { FAILURE_DEFAULT_SCORE };
            let [satisfaction, comprehension, goal_alignment, conversational_quality] = match scores.as_slice() {
                [] => [default; 4],
                [s, c, g] => [*s, *c, *g, default],
                [s, c, g, q] => [*s, *c, *g, *q],
                _ => anyhow::bail!("expected 0, 3 or 4 scores, got {}", scores.len()),
            };

            Ok(ChatInput::Outcome(ConsultationOutcome {
                successful,
                satisfaction,
                comprehension,
                goal_alignment,
                conversational_quality,
                issues: Vec::new(),
            }))
        }
        _ => anyhow::bail!("unknown command '/{}' (try /help)", command),
    }
}

pub async fn execute(args: ChatArgs, config: CounselConfig) -> Result<()> {
    let service = AdvisorService::from_config(&config)
        .await
        .context("Failed to start advisor service")?;

    let consultation_id = ConsultationId::new();
    let customer = CustomerProfile::new(args.customer_id);
    service.open_consultation(consultation_id, customer.clone(), &args.task_type);

    println!("{} {}", "Consultation".bold(), consultation_id);
    println!("{}", HELP.dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut learned = false;
    loop {
        print!("{} ", ">".bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                continue;
            }
        };

        match input {
            ChatInput::Empty => continue,
            ChatInput::Help => println!("{}", HELP),
            ChatInput::Quit => break,
            ChatInput::Message(message) => {
                let request = GuidanceRequest {
                    consultation_id,
                    customer: customer.clone(),
                    task_type: args.task_type.clone(),
                    message,
                };
                // A fresh token per turn so Ctrl-C abandons the turn, not the session
                let cancel = cancel_on_ctrl_c();
                let result = if args.stream {
                    stream_turn(&service, request, &cancel).await
                } else {
                    answer_turn(&service, &request, &cancel).await
                };
                if let Err(e) = result {
                    eprintln!("{} {:#}", "Turn failed:".red(), e);
                }
            }
            ChatInput::Outcome(outcome) => {
                service.wait_for_background().await;
                let cancel = cancel_on_ctrl_c();
                match service.record_outcome(consultation_id, &outcome, &cancel).await {
                    Ok(report) => {
                        render::print_learning_report(&report);
                        learned = true;
                        break;
                    }
                    Err(e) => eprintln!("{} {:#}", "Learning failed:".red(), e),
                }
            }
        }
    }

    if !learned {
        service.wait_for_background().await;
        if let Err(e) = service.abandon_consultation(consultation_id).await {
            eprintln!("{} {:#}", "Failed to close consultation:".red(), e);
        }
    }
    service.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_messages() {
        assert_eq!(parse_input("   ").unwrap(), ChatInput::Empty);
        assert_eq!(
            parse_input(" Should I consolidate my pensions? ").unwrap(),
            ChatInput::Message("Should I consolidate my pensions?".to_string())
        );
        assert_eq!(parse_input("/quit").unwrap(), ChatInput::Quit);
        assert_eq!(parse_input("/exit").unwrap(), ChatInput::Quit);
    }

    #[test]
    fn test_outcome_defaults() {
        let ChatInput::Outcome(outcome) = parse_input("/outcome success").unwrap() else {
            panic!("expected outcome");
        };
        assert!(outcome.successful);
        assert_eq!(outcome.satisfaction, SUCCESS_DEFAULT_SCORE);
        assert_eq!(outcome.conversational_quality, SUCCESS_DEFAULT_SCORE);

        let ChatInput::Outcome(outcome) = parse_input("/outcome failure").unwrap() else {
            panic!("expected outcome");
        };
        assert!(!outcome.successful);
        assert_eq!(outcome.goal_alignment, FAILURE_DEFAULT_SCORE);
    }

    #[test]
    fn test_outcome_scores() {
        let ChatInput::Outcome(outcome) = parse_input("/outcome success 0.9 0.7 0.6 0.4").unwrap() else {
            panic!("expected outcome");
        };
        assert_eq!(outcome.satisfaction, 0.9);
        assert_eq!(outcome.comprehension, 0.7);
        assert_eq!(outcome.goal_alignment, 0.6);
        assert_eq!(outcome.conversational_quality, 0.4);

        let ChatInput::Outcome(outcome) = parse_input("/outcome failure 0.1 0.2 0.3").unwrap() else {
            panic!("expected outcome");
        };
        assert_eq!(outcome.conversational_quality, FAILURE_DEFAULT_SCORE);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_input("/outcome maybe").is_err());
        assert!(parse_input("/outcome success 0.9").is_err());
        assert!(parse_input("/outcome success 1.5 0.5 0.5").is_err());
        assert!(parse_input("/outcome success a b c").is_err());
        assert!(parse_input("/dance").is_err());
    }
}
