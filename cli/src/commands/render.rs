// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal rendering shared by the guidance commands

use colored::{ColoredString, Colorize};

use counsel_core::application::GuidanceReply;
use counsel_core::domain::compliance::{Route, Verdict};
use counsel_core::domain::context::RetrievedContext;
use counsel_core::LearningReport;

fn score(value: f64) -> String {
    format!("{:.2}", value)
}

fn route_label(route: Route) -> ColoredString {
    match route {
        Route::Return => route.as_str().green(),
        Route::Refine => route.as_str().yellow(),
        Route::Strengthen => route.as_str().cyan(),
    }
}

pub fn print_context(context: &RetrievedContext) {
    if context.is_empty() {
        println!("{}", "No stored knowledge matches this query.".dimmed());
        return;
    }

    println!("{}", format!("Memories ({})", context.memories.len()).bold());
    for scored in &context.memories {
        println!(
            "  {} [{}] {}",
            score(scored.score).bold(),
            scored.record.kind.as_str(),
            scored.record.description
        );
        println!(
            "       {}",
            format!(
                "recency {} · importance {} · relevance {}",
                score(scored.recency),
                score(scored.importance),
                score(scored.relevance)
            )
            .dimmed()
        );
    }

    println!("{}", format!("Cases ({})", context.cases.len()).bold());
    for scored in &context.cases {
        let case = &scored.record;
        let outcome = if case.outcome.success { "success".green() } else { "failure".red() };
        println!(
            "  {} [{}] {} ({})",
            score(scored.score).bold(),
            case.task_type,
            case.situation_summary,
            outcome
        );
    }

    println!("{}", format!("Rules ({})", context.rules.len()).bold());
    for scored in &context.rules {
        let rule = &scored.record;
        println!(
            "  {} [{}] {} {}",
            score(scored.score).bold(),
            rule.domain,
            rule.principle,
            format!("(confidence {})", score(rule.confidence())).dimmed()
        );
    }
}

pub fn print_verdict(verdict: &Verdict) {
    let status = if verdict.passed { "passed".green() } else { "failed".red() };
    println!("{} {} (confidence {})", "Compliance:".bold(), status, score(verdict.confidence));
    if verdict.requires_human_review {
        println!("  {}", "flagged for human review".yellow());
    }
    for issue in &verdict.issues {
        println!("  - {}", issue);
    }
}

pub fn print_reply_summary(reply: &GuidanceReply) {
    println!();
    println!(
        "{} {} · {} generation calls{}",
        "Route:".bold(),
        route_label(reply.route),
        reply.generation_calls,
        if reply.borderline { " · borderline".yellow().to_string() } else { String::new() }
    );
    print_verdict(&reply.verdict);
}

pub fn print_learning_report(report: &LearningReport) {
    match report {
        LearningReport::CaseStored { case_id, .. } => {
            println!("{} case {}", "Stored".green(), case_id);
        }
        LearningReport::RuleCreated { rule_id, .. } => {
            println!("{} rule {}", "Created".green(), rule_id);
        }
        LearningReport::RuleRejected { stage, reason, .. } => {
            println!("{} at {}: {}", "No rule learned".yellow(), stage.as_str(), reason);
        }
    }
    for change in report.recalibrated() {
        println!(
            "  rule {} confidence {} → {}",
            change.rule_id,
            score(change.old_confidence),
            score(change.new_confidence)
        );
    }
}
