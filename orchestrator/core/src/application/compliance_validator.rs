// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compliance Validator
//!
//! Scores guidance text against the five-criterion rubric with one
//! generation call and derives the [`Verdict`]. A failing verdict is a normal
//! result; only an unusable response is an error.

use metrics::counter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::generation::Generator;
use crate::domain::compliance::{parse_verdict, ComplianceThresholds, Verdict};
use crate::domain::config::ComplianceConfig;
use crate::domain::consultation::CustomerProfile;
use crate::domain::error::GuidanceError;
use crate::domain::llm::GenerationOptions;
use crate::domain::prompt::PromptRequest;

pub struct ComplianceValidator {
    generator: Arc<Generator>,
    thresholds: ComplianceThresholds,
    options: GenerationOptions,
}

impl ComplianceValidator {
    pub fn new(generator: Arc<Generator>, config: &ComplianceConfig) -> Self {
        Self {
            generator,
            thresholds: config.thresholds(),
            options: GenerationOptions {
                max_tokens: Some(config.max_tokens),
                temperature: Some(config.temperature),
                stop_sequences: None,
            },
        }
    }

    pub fn thresholds(&self) -> &ComplianceThresholds {
        &self.thresholds
    }

    pub async fn validate(
        &self,
        guidance: &str,
        customer: &CustomerProfile,
        reasoning: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Verdict, GuidanceError> {
        let request = PromptRequest::Compliance {
            guidance,
            customer,
            reasoning,
        };
        let verdict = self
            .generator
            .complete_parsed(&request, &self.options, cancel, |text| {
                parse_verdict(text, &self.thresholds)
            })
            .await?;

        let route = verdict.route();
        counter!("counsel_verdicts_total", "route" => route.as_str()).increment(1);
        info!(
            customer_id = %customer.customer_id,
            passed = verdict.passed,
            confidence = verdict.confidence,
            borderline = verdict.is_borderline(&self.thresholds),
            route = route.as_str(),
            issues = verdict.issues.len(),
            "Compliance verdict"
        );
        Ok(verdict)
    }
}
