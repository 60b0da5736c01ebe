// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Default [`PromptBuilder`]: renders one system and one user message per
//! generation purpose from embedded Handlebars templates.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn a [`PromptRequest`] into chat messages
//! - **Integration:** OrchestrationEngine / ComplianceValidator / LearningLoop → LLM input
//!
//! # Template Data
//!
//! Turn prompts see `customer`, `task_type`, `question`, `history`,
//! `memories`, `cases`, `rules`, `phase`, `emotion` and `carried_issues`,
//! plus the purpose-specific fields (`reasoning`, `draft`, `issues`,
//! `confidence`). Rendering is non-strict: a missing field renders empty.

use handlebars::Handlebars;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::domain::compliance::Criterion;
use crate::domain::consultation::{CustomerProfile, Turn};
use crate::domain::llm::ChatMessage;
use crate::domain::prompt::{GenerationPurpose, PromptBuilder, PromptError, PromptRequest, TurnFrame};

// ============================================================================
// Embedded Templates
// ============================================================================

const ADVISOR_SYSTEM: &str = "\
You are a financial guidance assistant working for a regulated firm. You give \
guidance, never personal advice: explain options, trade-offs and risks, and do \
not tell the customer which product to buy or what to do with their money.
{{#if rules}}
Principles learned from past consultations:
{{#each rules}}- {{this.principle}} (confidence {{this.confidence}})
{{/each}}{{/if}}
The conversation is in its {{phase}} phase and the customer seems {{emotion}}. \
Adjust tone accordingly.";

const FRAME: &str = "\
Consultation type: {{task_type}}
Customer: {{customer.customer_id}}{{#if customer.name}} ({{customer.name}}){{/if}}\
{{#if customer.age}}, age {{customer.age}}{{/if}}
{{#if customer.situation}}Situation: {{customer.situation}}
{{/if}}{{#if customer.goals}}Goals:
{{#each customer.goals}}- {{this}}
{{/each}}{{/if}}{{#if customer.risk_tolerance}}Risk tolerance: {{customer.risk_tolerance}}
{{/if}}{{#if memories}}
Relevant memories:
{{#each memories}}- {{this}}
{{/each}}{{/if}}{{#if cases}}
Similar past consultations that went well:
{{#each cases}}- [{{this.task_type}}] {{this.situation_summary}}
  Guidance given: {{this.guidance_text}}
{{/each}}{{/if}}{{#if carried_issues}}
A compliance review of your previous answer raised these issues. Address them now:
{{#each carried_issues}}- {{this}}
{{/each}}{{/if}}{{#if history}}
Conversation so far:
{{#each history}}{{this.speaker}}: {{this.text}}
{{/each}}{{/if}}
Customer's latest message: {{question}}
";

const REASONING_USER: &str = "{{> frame}}
Before answering, think step by step: what does the customer actually need to \
understand, which risks must be disclosed, and where is the boundary between \
guidance and advice for this question? Write your reasoning only, not the answer.";

const GUIDANCE_USER: &str = "{{> frame}}{{#if reasoning}}
Your earlier reasoning:
{{reasoning}}
{{/if}}
Write your reply to the customer. Disclose relevant risks, check their \
understanding, and signpost further help where appropriate.";

const REFINE_USER: &str = "{{> frame}}
Your draft reply:
{{draft}}

A compliance review failed the draft for these reasons:
{{#each issues}}- {{this}}
{{/each}}
Rewrite the reply so that every issue is resolved. Reply with the new text only.";

const STRENGTHEN_USER: &str = "{{> frame}}
Your draft reply:
{{draft}}

A compliance review passed the draft with low confidence ({{confidence}}).
{{#if issues}}Points raised:
{{#each issues}}- {{this}}
{{/each}}{{/if}}
Strengthen the reply: make risk disclosures explicit, keep clear of personal \
advice, and check the customer's understanding. Reply with the new text only.";

const COMPLIANCE_SYSTEM: &str = "\
You are a compliance officer reviewing guidance given to a retail customer. \
Judge the text strictly against the rubric and answer with JSON only.";

const COMPLIANCE_USER: &str = "\
Customer: {{customer.customer_id}}{{#if customer.age}}, age {{customer.age}}{{/if}}
{{#if customer.situation}}Situation: {{customer.situation}}
{{/if}}{{#if reasoning}}
Advisor reasoning:
{{reasoning}}
{{/if}}
Guidance under review:
{{guidance}}

Rubric:
- advice_boundary: gives guidance only, no personal recommendation
- risk_disclosure: material risks are disclosed
- clarity: plain language the customer can follow
- understanding_check: checks the customer's understanding
- signposting: points to further help where appropriate

Respond with:
```json
{
  \"criteria\": {
{{#each criteria}}    \"{{this}}\": {\"passed\": true, \"note\": \"...\"}{{#unless @last}},{{/unless}}
{{/each}}  },
  \"confidence\": 0.0,
  \"issues\": [\"...\"]
}
```";

const LEARNING_SYSTEM: &str = "\
You help a financial guidance team learn from finished consultations. Be \
specific and concrete. Never recommend products.";

const SUMMARY_USER: &str = "\
Consultation type: {{task_type}}
Customer: {{customer.customer_id}}{{#if customer.situation}} ({{customer.situation}}){{/if}}

Transcript:
{{#each transcript}}{{this.speaker}}: {{this.text}}
{{/each}}
Summarise the customer's situation and what they needed in two or three sentences.";

const REFLECT_USER: &str = "\
This {{task_type}} consultation went badly.
Satisfaction {{outcome.satisfaction}}, comprehension {{outcome.comprehension}}, \
goal alignment {{outcome.goal_alignment}}.
{{#if outcome.issues}}Reported issues:
{{#each outcome.issues}}- {{this}}
{{/each}}{{/if}}
Transcript:
{{#each transcript}}{{this.speaker}}: {{this.text}}
{{/each}}
Propose one principle that would have avoided the failure. Answer with JSON only:
{\"principle\": \"...\", \"domain\": \"...\"}";

const VALIDATE_PRINCIPLE_USER: &str = "\
Proposed principle ({{domain}}): {{principle}}

Would following this principle ever lead an advisor to give personal financial \
advice or otherwise breach regulation? Answer with JSON only:
{\"valid\": true, \"confidence\": 0.0, \"reason\": \"...\"}";

const REFINE_PRINCIPLE_USER: &str = "\
Principle ({{domain}}): {{principle}}

Transcript it was learned from:
{{#each transcript}}{{this.speaker}}: {{this.text}}
{{/each}}
Rewrite the principle as one specific, actionable instruction an advisor can \
follow in the moment. Answer with JSON only:
{\"principle\": \"...\"}";

const JUDGE_VALUE_USER: &str = "\
Principle ({{domain}}): {{principle}}

Is this principle specific enough to change how an advisor behaves, or is it a \
generic platitude? Answer with JSON only:
{\"worth_keeping\": true, \"reason\": \"...\"}";

// ============================================================================
// Template Engine
// ============================================================================

/// System and user template pair for one purpose
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
        }
    }
}

pub struct TemplatePromptBuilder {
    handlebars: Handlebars<'static>,
    templates: HashMap<GenerationPurpose, PromptTemplate>,
}

impl TemplatePromptBuilder {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Don't fail on missing variables
        handlebars.set_strict_mode(false);
        // Prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut builder = Self {
            handlebars,
            templates: HashMap::new(),
        };
        // The embedded partial is a compile-time constant known to parse
        if let Err(e) = builder.handlebars.register_partial("frame", FRAME) {
            tracing::error!("Failed to register frame partial: {}", e);
        }

        use GenerationPurpose::*;
        for (purpose, system, user) in [
            (Reasoning, ADVISOR_SYSTEM, REASONING_USER),
            (Guidance, ADVISOR_SYSTEM, GUIDANCE_USER),
            (Refine, ADVISOR_SYSTEM, REFINE_USER),
            (Strengthen, ADVISOR_SYSTEM, STRENGTHEN_USER),
            (Compliance, COMPLIANCE_SYSTEM, COMPLIANCE_USER),
            (SituationSummary, LEARNING_SYSTEM, SUMMARY_USER),
            (Reflect, LEARNING_SYSTEM, REFLECT_USER),
            (ValidatePrinciple, COMPLIANCE_SYSTEM, VALIDATE_PRINCIPLE_USER),
            (RefinePrinciple, LEARNING_SYSTEM, REFINE_PRINCIPLE_USER),
            (JudgeValue, LEARNING_SYSTEM, JUDGE_VALUE_USER),
        ] {
            builder.templates.insert(purpose, PromptTemplate::new(system, user));
        }
        builder
    }

    /// Replace the templates of one purpose after checking they compile
    pub fn with_template(mut self, purpose: GenerationPurpose, template: PromptTemplate) -> Result<Self, PromptError> {
        Self::validate_template(&template.system)?;
        Self::validate_template(&template.user)?;
        self.templates.insert(purpose, template);
        Ok(self)
    }

    /// Validate template syntax without rendering
    pub fn validate_template(template: &str) -> Result<(), PromptError> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .map_err(|e| PromptError(format!("Invalid Handlebars template syntax: {}", e)))
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<String, PromptError> {
        self.handlebars
            .render_template(template, data)
            .map_err(|e| PromptError(format!("Failed to render prompt template: {}", e)))
    }

    fn data(request: &PromptRequest<'_>) -> Value {
        match *request {
            PromptRequest::Reasoning { frame } => frame_data(frame),
            PromptRequest::Guidance { frame, reasoning } => {
                with_fields(frame_data(frame), json!({ "reasoning": reasoning }))
            }
            PromptRequest::Refine { frame, draft, issues } => {
                with_fields(frame_data(frame), json!({ "draft": draft, "issues": issues }))
            }
            PromptRequest::Strengthen { frame, draft, verdict } => with_fields(
                frame_data(frame),
                json!({
                    "draft": draft,
                    "confidence": format!("{:.2}", verdict.confidence),
                    "issues": verdict.issues,
                }),
            ),
            PromptRequest::Compliance {
                guidance,
                customer,
                reasoning,
            } => json!({
                "guidance": guidance,
                "customer": customer,
                "reasoning": reasoning,
                "criteria": Criterion::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            }),
            PromptRequest::SituationSummary {
                task_type,
                customer,
                transcript,
            } => json!({
                "task_type": task_type,
                "customer": customer,
                "transcript": transcript_data(transcript),
            }),
            PromptRequest::Reflect {
                task_type,
                transcript,
                outcome,
            } => json!({
                "task_type": task_type,
                "transcript": transcript_data(transcript),
                "outcome": outcome,
            }),
            PromptRequest::ValidatePrinciple { proposal } => json!({
                "principle": proposal.principle,
                "domain": proposal.domain,
            }),
            PromptRequest::RefinePrinciple { proposal, transcript } => json!({
                "principle": proposal.principle,
                "domain": proposal.domain,
                "transcript": transcript_data(transcript),
            }),
            PromptRequest::JudgeValue { principle, domain } => json!({
                "principle": principle,
                "domain": domain,
            }),
        }
    }
}

impl Default for TemplatePromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build(&self, request: &PromptRequest<'_>) -> Result<Vec<ChatMessage>, PromptError> {
        let purpose = request.purpose();
        let template = self
            .templates
            .get(&purpose)
            .ok_or_else(|| PromptError(format!("No template for {}", purpose.as_str())))?;
        let data = Self::data(request);

        Ok(vec![
            ChatMessage::system(self.render(&template.system, &data)?),
            ChatMessage::user(self.render(&template.user, &data)?),
        ])
    }
}

fn transcript_data(transcript: &[Turn]) -> Value {
    Value::Array(
        transcript
            .iter()
            .map(|t| json!({ "speaker": t.speaker, "text": t.text }))
            .collect(),
    )
}

fn customer_data(customer: &CustomerProfile) -> Value {
    serde_json::to_value(customer).unwrap_or(Value::Null)
}

fn frame_data(frame: &TurnFrame<'_>) -> Value {
    let context = frame.context;
    json!({
        "customer": customer_data(frame.customer),
        "task_type": frame.task_type,
        "question": frame.question,
        "history": transcript_data(frame.history),
        "memories": context.memories.iter().map(|m| m.record.description.as_str()).collect::<Vec<_>>(),
        "cases": context.cases.iter().map(|c| json!({
            "task_type": c.record.task_type,
            "situation_summary": c.record.situation_summary,
            "guidance_text": c.record.guidance_text,
        })).collect::<Vec<_>>(),
        "rules": context.rules.iter().map(|r| json!({
            "principle": r.record.principle,
            "confidence": format!("{:.2}", r.record.confidence()),
        })).collect::<Vec<_>>(),
        "phase": frame.signals.phase.as_str(),
        "emotion": frame.signals.emotion.as_str(),
        "carried_issues": frame.carried_issues,
    })
}

fn with_fields(mut base: Value, extra: Value) -> Value {
    if let (Value::Object(base_map), Value::Object(extra_map)) = (&mut base, extra) {
        base_map.extend(extra_map);
    }
    base
}
