//! OpenAI chat-completions client
//!
//! 1 つの client で extraction / briefing / email の 3 adapter を実装する。
//!
//! - extraction: JSON mode → `ExtractedFields`
//! - briefing: markdown テキスト
//! - email: JSON mode → `{subject, body}`
//!
//! 各呼び出しは stage ごとのタイムアウトで `tokio::time::timeout` に包む。
//! リトライはしない（executor 側の責務）。

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{OpenAiSettings, TimeoutSettings};
use crate::domain::{BusinessProfile, ExtractedFields, Lead, Stage, StageError};
use crate::ports::{
    BriefingGenerator, BriefingInput, EmailGenerator, EmailInput, Extractor, GeneratedEmail,
    StageContext,
};

const EXTRACTION_SYSTEM: &str = "You extract contact data from company websites. \
Answer with a JSON object with the keys emails (array of strings), phones (array of strings), \
contact_name, contact_role, address (strings or null) and social_media (object with optional \
linkedin, instagram, facebook, twitter). Only include data that appears in the text.";

const BRIEFING_SYSTEM: &str = "You are a B2B sales analyst. Write a pre-call briefing in \
markdown, in Brazilian Portuguese, with the sections: company overview, likely pains, \
how our offer helps, and suggested opening questions. Be concrete and brief.";

const EMAIL_SYSTEM: &str = "You write short, personal cold emails in Brazilian Portuguese. \
Answer with a JSON object with the keys subject and body. The body is plain text, at most \
150 words, and ends with the sender's name when one is given.";

pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeouts: TimeoutSettings,
}

impl OpenAiClient {
    pub fn new(
        settings: &OpenAiSettings,
        api_key: &str,
        timeouts: TimeoutSettings,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeouts,
        })
    }

    /// One chat completion, returning the first choice's message content.
    async fn complete(
        &self,
        stage: Stage,
        timeout: Duration,
        system: &str,
        user: String,
        json_mode: bool,
    ) -> Result<String, StageError> {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        tokio::time::timeout(timeout, self.send(stage, timeout, &body))
            .await
            .map_err(|_| StageError::Timeout {
                stage,
                after: timeout,
            })?
    }

    async fn send(&self, stage: Stage, timeout: Duration, body: &Value) -> Result<String, StageError> {
        let transport = |err: reqwest::Error| {
            if err.is_timeout() {
                StageError::Timeout {
                    stage,
                    after: timeout,
                }
            } else {
                StageError::upstream(stage, err.to_string())
            }
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StageError::upstream(
                stage,
                format!("OpenAI API returned {status}: {}", detail.trim()),
            ));
        }

        let payload: Value = response.json().await.map_err(|e| {
            StageError::invalid_response(stage, format!("response is not JSON: {e}"))
        })?;

        let content = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|c| c.as_str())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StageError::invalid_response(stage, "missing message content"))?;

        debug!(%stage, chars = content.len(), "completion received");
        Ok(content.to_string())
    }
}

#[async_trait]
impl Extractor for OpenAiClient {
    async fn extract(
        &self,
        _ctx: &StageContext,
        content: &str,
    ) -> Result<ExtractedFields, StageError> {
        let raw = self
            .complete(
                Stage::Extract,
                self.timeouts.extract(),
                EXTRACTION_SYSTEM,
                format!("Website text:\n\n{content}"),
                true,
            )
            .await?;

        serde_json::from_str(&raw).map_err(|e| {
            StageError::invalid_response(Stage::Extract, format!("unexpected extraction JSON: {e}"))
        })
    }
}

#[async_trait]
impl BriefingGenerator for OpenAiClient {
    async fn generate_briefing(
        &self,
        ctx: &StageContext,
        input: &BriefingInput,
    ) -> Result<String, StageError> {
        self.complete(
            Stage::Briefing,
            self.timeouts.briefing(),
            BRIEFING_SYSTEM,
            briefing_prompt(ctx, input),
            false,
        )
        .await
    }
}

#[async_trait]
impl EmailGenerator for OpenAiClient {
    async fn generate_email(
        &self,
        ctx: &StageContext,
        input: &EmailInput,
    ) -> Result<GeneratedEmail, StageError> {
        let raw = self
            .complete(
                Stage::Email,
                self.timeouts.email(),
                EMAIL_SYSTEM,
                email_prompt(ctx, input),
                true,
            )
            .await?;

        let email: GeneratedEmail = serde_json::from_str(&raw).map_err(|e| {
            StageError::invalid_response(Stage::Email, format!("unexpected email JSON: {e}"))
        })?;
        if email.subject.trim().is_empty() || email.body.trim().is_empty() {
            return Err(StageError::invalid_response(
                Stage::Email,
                "email subject or body is empty",
            ));
        }
        Ok(email)
    }
}

// ========================================
// Prompts
// ========================================

fn briefing_prompt(ctx: &StageContext, input: &BriefingInput) -> String {
    let mut prompt = String::new();
    push_lead(&mut prompt, &input.lead);
    push_sender(&mut prompt, ctx.business_profile.as_deref());
    let _ = write!(prompt, "\n## Research material\n{}\n", input.content);
    prompt
}

fn email_prompt(ctx: &StageContext, input: &EmailInput) -> String {
    let mut prompt = String::new();
    push_lead(&mut prompt, &input.lead);
    push_sender(&mut prompt, ctx.business_profile.as_deref());
    if let Some(name) = ctx.sender_name() {
        let _ = writeln!(prompt, "Sign as: {name}");
    }
    if let Some(briefing) = &input.briefing {
        let _ = write!(prompt, "\n## Briefing\n{briefing}\n");
    }
    prompt
}

fn push_lead(prompt: &mut String, lead: &Lead) {
    let _ = writeln!(prompt, "## Prospect\nCompany: {}", lead.company_name);
    if let Some(name) = &lead.contact_name {
        match &lead.contact_role {
            Some(role) => {
                let _ = writeln!(prompt, "Contact: {name} ({role})");
            }
            None => {
                let _ = writeln!(prompt, "Contact: {name}");
            }
        }
    }
    if let Some(category) = &lead.category {
        let _ = writeln!(prompt, "Category: {category}");
    }
    if let (Some(city), Some(state)) = (&lead.city, &lead.state) {
        let _ = writeln!(prompt, "Location: {city} - {state}");
    }
    if let Some(website) = lead.primary_website() {
        let _ = writeln!(prompt, "Website: {website}");
    }
}

fn push_sender(prompt: &mut String, profile: Option<&BusinessProfile>) {
    let Some(profile) = profile else {
        return;
    };
    let _ = writeln!(prompt, "\n## Our company\nName: {}", profile.company_name);
    if let Some(description) = &profile.description {
        let _ = writeln!(prompt, "What we do: {description}");
    }
    if let Some(problem) = &profile.problem_solved {
        let _ = writeln!(prompt, "Problem we solve: {problem}");
    }
    if !profile.differentials.is_empty() {
        let _ = writeln!(prompt, "Differentials: {}", profile.differentials.join("; "));
    }
    if let Some(tone) = &profile.tone {
        let _ = writeln!(prompt, "Tone: {tone}");
    }
}
