//! Single-lead stage executors.
//!
//! Each executor composes one or more stage adapters, the retry wrapper and
//! Lead Store reads/writes into "enrich / brief / email this lead". They never
//! return `Err`: every outcome, including persistence failures, ends up in the
//! returned [`EnrichmentResult`].
//!
//! # 責務
//! - 前提条件チェック（website の有無、成果物の有無）
//! - adapter 呼び出し（リトライは adapter 呼び出しだけを包む）
//! - 結果の書き戻し
//! - adapter 呼び出しごとの usage 記録
//!
//! Extraction is called once per lead with no retry: its failure is final for
//! that lead.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use super::content::synthesize_profile;
use super::retry::{RetryPolicy, retry};
use crate::domain::lead::workflow;
use crate::domain::{Briefing, EmailDraft, EnrichmentResult, Stage, StageError, UsageRecord};
use crate::ports::{
    BriefingGenerator, BriefingInput, Clock, EmailGenerator, EmailInput, Extractor, LeadStore,
    Scraper, StageContext,
};

/// Adapter set used by the executors. A `None` slot means the capability is
/// not configured; stages that need it answer [`StageError::Unavailable`].
#[derive(Clone, Default)]
pub struct StageAdapters {
    pub scraper: Option<Arc<dyn Scraper>>,
    pub extractor: Option<Arc<dyn Extractor>>,
    pub briefing: Option<Arc<dyn BriefingGenerator>>,
    pub email: Option<Arc<dyn EmailGenerator>>,
}

impl StageAdapters {
    fn scraper(&self) -> Result<&dyn Scraper, StageError> {
        self.scraper.as_deref().ok_or(StageError::Unavailable {
            stage: Stage::Scrape,
        })
    }

    fn extractor(&self) -> Result<&dyn Extractor, StageError> {
        self.extractor.as_deref().ok_or(StageError::Unavailable {
            stage: Stage::Extract,
        })
    }

    fn briefing(&self) -> Result<&dyn BriefingGenerator, StageError> {
        self.briefing.as_deref().ok_or(StageError::Unavailable {
            stage: Stage::Briefing,
        })
    }

    fn email(&self) -> Result<&dyn EmailGenerator, StageError> {
        self.email.as_deref().ok_or(StageError::Unavailable {
            stage: Stage::Email,
        })
    }
}

/// What the enrich step already learned about the website, so a following
/// brief step does not scrape the same page again.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scraped {
    NotAttempted,
    Content(String),
    Failed,
}

pub struct StageExecutor {
    store: Arc<dyn LeadStore>,
    adapters: StageAdapters,
    clock: Arc<dyn Clock>,
}

impl StageExecutor {
    pub fn new(store: Arc<dyn LeadStore>, adapters: StageAdapters, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            adapters,
            clock,
        }
    }

    /// Scrape the lead's website, extract contact fields and write them back.
    #[instrument(skip_all, fields(task_id = %ctx.task_id, lead_id = %ctx.lead_id))]
    pub async fn enrich(&self, ctx: &StageContext, policy: &RetryPolicy) -> EnrichmentResult {
        let mut scraped = Scraped::NotAttempted;
        match self.try_enrich(ctx, policy, &mut scraped).await {
            Ok(()) => EnrichmentResult::enriched(ctx.lead_id.clone()),
            Err(err) => {
                warn!(stage = "enrich", error = %err, "lead enrichment failed");
                EnrichmentResult::failed(ctx.lead_id.clone(), err.to_string())
            }
        }
    }

    /// Generate and store a pre-call briefing, unless one exists already.
    #[instrument(skip_all, fields(task_id = %ctx.task_id, lead_id = %ctx.lead_id))]
    pub async fn brief(&self, ctx: &StageContext, policy: &RetryPolicy) -> EnrichmentResult {
        match self.try_brief(ctx, policy, Scraped::NotAttempted).await {
            Ok(()) => EnrichmentResult::briefed(ctx.lead_id.clone()),
            Err(err) => {
                warn!(stage = "brief", error = %err, "briefing failed");
                EnrichmentResult::failed(ctx.lead_id.clone(), err.to_string())
            }
        }
    }

    /// Draft and store a cold email, unless one exists already.
    #[instrument(skip_all, fields(task_id = %ctx.task_id, lead_id = %ctx.lead_id))]
    pub async fn email(&self, ctx: &StageContext, policy: &RetryPolicy) -> EnrichmentResult {
        match self.try_email(ctx, policy).await {
            Ok(()) => EnrichmentResult::emailed(ctx.lead_id.clone()),
            Err(err) => {
                warn!(stage = "email", error = %err, "email drafting failed");
                EnrichmentResult::failed(ctx.lead_id.clone(), err.to_string())
            }
        }
    }

    /// Enrich, then brief, then email, each attempted whatever happened
    /// before it.
    ///
    /// The lead counts as done when briefing or email succeeded; enrichment
    /// alone is not enough. `error` lists every stage that failed, even when
    /// the lead as a whole succeeded.
    #[instrument(skip_all, fields(task_id = %ctx.task_id, lead_id = %ctx.lead_id))]
    pub async fn full(&self, ctx: &StageContext, policy: &RetryPolicy) -> EnrichmentResult {
        let mut scraped = Scraped::NotAttempted;
        let enriched = self.try_enrich(ctx, policy, &mut scraped).await;
        let briefed = self.try_brief(ctx, policy, scraped).await;
        let emailed = self.try_email(ctx, policy).await;

        let mut errors = Vec::new();
        for (stage, outcome) in [
            ("enrich", enriched.as_ref().err()),
            ("brief", briefed.as_ref().err()),
            ("email", emailed.as_ref().err()),
        ] {
            if let Some(err) = outcome {
                warn!(stage, error = %err, "stage failed");
                errors.push(format!("{stage}: {err}"));
            }
        }

        EnrichmentResult {
            lead_id: ctx.lead_id.clone(),
            success: briefed.is_ok() || emailed.is_ok(),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            enriched: enriched.is_ok(),
            briefed: briefed.is_ok(),
            emailed: emailed.is_ok(),
        }
    }

    // ---- stages ----

    async fn try_enrich(
        &self,
        ctx: &StageContext,
        policy: &RetryPolicy,
        scraped: &mut Scraped,
    ) -> Result<(), StageError> {
        let mut lead = self.store.get_lead(&ctx.lead_id).await?;
        let url = lead
            .primary_website()
            .ok_or(StageError::NoWebsite)?
            .to_string();

        let content = match self.scrape(ctx, policy, &url).await {
            Ok(content) => content,
            Err(err) => {
                *scraped = Scraped::Failed;
                return Err(err);
            }
        };
        *scraped = Scraped::Content(content.clone());

        let extractor = self.adapters.extractor()?;
        let fields = self
            .metered(ctx, Stage::Extract, extractor.extract(ctx, &content))
            .await?;

        if fields.is_empty() {
            debug!("extraction found no new fields");
        }
        lead.apply_extracted(&fields);
        self.store.update_lead_enrichment(&lead).await?;
        Ok(())
    }

    async fn try_brief(
        &self,
        ctx: &StageContext,
        policy: &RetryPolicy,
        scraped: Scraped,
    ) -> Result<(), StageError> {
        if self.store.has_briefing(&ctx.lead_id).await? {
            debug!(stage = "brief", "briefing already exists, skipping");
            return Ok(());
        }
        let generator = self.adapters.briefing()?;
        let lead = self.store.get_lead(&ctx.lead_id).await?;

        let scraped = match (scraped, lead.primary_website()) {
            (Scraped::NotAttempted, Some(url)) => {
                let url = url.to_string();
                match self.scrape(ctx, policy, &url).await {
                    Ok(content) => Scraped::Content(content),
                    Err(err) => {
                        warn!(error = %err, "scrape for briefing failed, using fallback content");
                        Scraped::Failed
                    }
                }
            }
            (scraped, _) => scraped,
        };

        let content = match scraped {
            Scraped::Content(content) if !content.trim().is_empty() => content,
            _ => synthesize_profile(&lead).ok_or(StageError::NoContent)?,
        };

        let input = BriefingInput { lead, content };
        let input = &input;
        let text = retry(policy, Stage::Briefing.as_str(), move || {
            self.metered(ctx, Stage::Briefing, generator.generate_briefing(ctx, input))
        })
        .await?;

        self.store
            .insert_briefing(Briefing {
                lead_id: ctx.lead_id.clone(),
                user_id: ctx.user_id.clone(),
                task_id: ctx.task_id.clone(),
                content: text,
                created_at: self.clock.now(),
            })
            .await?;
        Ok(())
    }

    /// Skip-if-done counts as success; the skip is only logged.
    async fn try_email(&self, ctx: &StageContext, policy: &RetryPolicy) -> Result<(), StageError> {
        if self.store.has_email(&ctx.lead_id).await? {
            debug!(stage = "email", "email already drafted, skipping");
            return Ok(());
        }
        let generator = self.adapters.email()?;
        let lead = self.store.get_lead(&ctx.lead_id).await?;

        // briefing は補助情報。読めなくても続行する
        let briefing = match self.store.get_briefing(&ctx.lead_id).await {
            Ok(briefing) => briefing.map(|b| b.content),
            Err(err) => {
                warn!(error = %err, "could not load briefing for email context");
                None
            }
        };

        let input = EmailInput { lead, briefing };
        let input_ref = &input;
        let generated = retry(policy, Stage::Email.as_str(), move || {
            self.metered(ctx, Stage::Email, generator.generate_email(ctx, input_ref))
        })
        .await?;

        self.store
            .insert_email(EmailDraft {
                lead_id: ctx.lead_id.clone(),
                user_id: ctx.user_id.clone(),
                task_id: ctx.task_id.clone(),
                subject: generated.subject,
                body: generated.body,
                recipient: input.lead.primary_email().map(str::to_string),
                sender_name: ctx.sender_name().map(str::to_string),
                business_profile_id: ctx.business_profile.as_ref().map(|p| p.id.clone()),
                created_at: self.clock.now(),
            })
            .await?;
        self.store
            .update_lead_workflow_status(&ctx.lead_id, workflow::EMAIL_DRAFTED)
            .await?;
        Ok(())
    }

    // ---- helpers ----

    async fn scrape(
        &self,
        ctx: &StageContext,
        policy: &RetryPolicy,
        url: &str,
    ) -> Result<String, StageError> {
        let scraper = self.adapters.scraper()?;
        retry(policy, Stage::Scrape.as_str(), move || {
            self.metered(ctx, Stage::Scrape, scraper.scrape(ctx, url))
        })
        .await
    }

    /// Await one adapter call and record its usage.
    async fn metered<T, F>(&self, ctx: &StageContext, stage: Stage, call: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        let started = Instant::now();
        let result = call.await;
        let usage = UsageRecord {
            task_id: ctx.task_id.clone(),
            user_id: ctx.user_id.clone(),
            lead_id: ctx.lead_id.clone(),
            stage,
            success: result.is_ok(),
            duration_ms: started.elapsed().as_millis() as u64,
            recorded_at: self.clock.now(),
        };
        if let Err(err) = self.store.record_usage(usage).await {
            warn!(%stage, error = %err, "failed to record usage");
        }
        result
    }
}
