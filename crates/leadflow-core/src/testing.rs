//! Test doubles shared by the unit tests.
//!
//! - scripted stage adapters that record their calls
//! - a scraper that measures how many calls are in flight at once
//! - `TestStore`, a thin handle over `InMemoryLeadStore` with lookup helpers
//! - `FaultyStore`, an `InMemoryLeadStore` wrapper that fails chosen writes
//!   or yields after status reads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::app::executor::{StageAdapters, StageExecutor};
use crate::domain::{
    AutomationSettings, AutomationTask, Briefing, BusinessProfile, BusinessProfileId, EmailDraft,
    ExtractedFields, Lead, LeadId, Stage, StageError, StoreError, TaskId, TaskProgress,
    TaskRecord, TaskStatus, UsageRecord, UserId,
};
use crate::impls::InMemoryLeadStore;
use crate::ports::{
    BriefingGenerator, BriefingInput, Clock, EmailGenerator, EmailInput, Extractor, FixedClock,
    GeneratedEmail, LeadStore, Scraper, StageContext,
};

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
    ))
}

pub fn context(task_id: &str, lead_id: &str) -> StageContext {
    StageContext {
        task_id: TaskId::new(task_id),
        user_id: "u1".into(),
        lead_id: LeadId::new(lead_id),
        business_profile: None,
    }
}

pub fn executor(store: &TestStore, adapters: StageAdapters) -> StageExecutor {
    StageExecutor::new(store.shared(), adapters, fixed_clock())
}

// ========================================
// Store
// ========================================

#[derive(Clone)]
pub struct TestStore {
    pub inner: InMemoryLeadStore,
}

impl TestStore {
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let inner = InMemoryLeadStore::seeded(
            crate::impls::StoreSeed {
                leads: leads.into_iter().collect(),
                ..Default::default()
            },
            fixed_clock(),
        );
        Self { inner }
    }

    pub fn shared(&self) -> Arc<dyn LeadStore> {
        Arc::new(self.inner.clone())
    }

    pub async fn lead(&self, id: &str) -> Lead {
        self.inner.get_lead(&LeadId::new(id)).await.unwrap()
    }

    pub async fn seed_briefing(&self, lead_id: &str, content: &str) {
        self.inner
            .insert_briefing(Briefing {
                lead_id: LeadId::new(lead_id),
                user_id: "u1".into(),
                task_id: TaskId::new("earlier"),
                content: content.to_string(),
                created_at: fixed_clock().now(),
            })
            .await
            .unwrap();
    }

    pub async fn seed_email(&self, lead_id: &str) {
        self.inner
            .insert_email(EmailDraft {
                lead_id: LeadId::new(lead_id),
                user_id: "u1".into(),
                task_id: TaskId::new("earlier"),
                subject: "earlier".into(),
                body: "earlier".into(),
                recipient: None,
                sender_name: None,
                business_profile_id: None,
                created_at: fixed_clock().now(),
            })
            .await
            .unwrap();
    }

    pub async fn briefing_text(&self, lead_id: &str) -> Option<String> {
        self.inner
            .get_briefing(&LeadId::new(lead_id))
            .await
            .unwrap()
            .map(|b| b.content)
    }

    pub async fn email_draft(&self, lead_id: &str) -> Option<EmailDraft> {
        self.inner.email_draft(&LeadId::new(lead_id)).await
    }

    pub async fn usage_stages(&self) -> Vec<Stage> {
        self.inner.usage().await.into_iter().map(|u| u.stage).collect()
    }
}

// ========================================
// Faulty store
// ========================================

/// Writes `FaultyStore` can be told to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreWrite {
    LeadEnrichment,
    WorkflowStatus,
    Briefing,
    Email,
}

/// Delegates to an `InMemoryLeadStore`, failing the configured writes with a
/// backend error. With `yield_after_status_read`, every status read hands
/// control back to the scheduler before returning, so concurrent dispatches
/// of one task interleave between the read and the claim.
pub struct FaultyStore {
    inner: InMemoryLeadStore,
    failing: Vec<StoreWrite>,
    yield_after_status_read: bool,
}

impl FaultyStore {
    pub fn failing(store: &TestStore, failing: &[StoreWrite]) -> Arc<Self> {
        Arc::new(Self {
            inner: store.inner.clone(),
            failing: failing.to_vec(),
            yield_after_status_read: false,
        })
    }

    pub fn yielding(store: &TestStore) -> Arc<Self> {
        Arc::new(Self {
            inner: store.inner.clone(),
            failing: Vec::new(),
            yield_after_status_read: true,
        })
    }

    fn check(&self, write: StoreWrite) -> Result<(), StoreError> {
        if self.failing.contains(&write) {
            return Err(StoreError::Backend(format!("{write:?} write rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for FaultyStore {
    async fn create_task(&self, task: &AutomationTask) -> Result<bool, StoreError> {
        self.inner.create_task(task).await
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, StoreError> {
        self.inner.get_task(task_id).await
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus, StoreError> {
        let status = self.inner.get_task_status(task_id).await;
        if self.yield_after_status_read {
            tokio::task::yield_now().await;
        }
        status
    }

    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        self.inner
            .update_task_status(task_id, status, progress, error)
            .await
    }

    async fn update_progress(
        &self,
        task_id: &TaskId,
        progress: TaskProgress,
    ) -> Result<(), StoreError> {
        self.inner.update_progress(task_id, progress).await
    }

    async fn count_auto_tasks_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.count_auto_tasks_since(user_id, since).await
    }

    async fn get_lead(&self, lead_id: &LeadId) -> Result<Lead, StoreError> {
        self.inner.get_lead(lead_id).await
    }

    async fn update_lead_enrichment(&self, lead: &Lead) -> Result<(), StoreError> {
        self.check(StoreWrite::LeadEnrichment)?;
        self.inner.update_lead_enrichment(lead).await
    }

    async fn update_lead_workflow_status(
        &self,
        lead_id: &LeadId,
        status: &str,
    ) -> Result<(), StoreError> {
        self.check(StoreWrite::WorkflowStatus)?;
        self.inner.update_lead_workflow_status(lead_id, status).await
    }

    async fn has_briefing(&self, lead_id: &LeadId) -> Result<bool, StoreError> {
        self.inner.has_briefing(lead_id).await
    }

    async fn get_briefing(&self, lead_id: &LeadId) -> Result<Option<Briefing>, StoreError> {
        self.inner.get_briefing(lead_id).await
    }

    async fn insert_briefing(&self, briefing: Briefing) -> Result<(), StoreError> {
        self.check(StoreWrite::Briefing)?;
        self.inner.insert_briefing(briefing).await
    }

    async fn has_email(&self, lead_id: &LeadId) -> Result<bool, StoreError> {
        self.inner.has_email(lead_id).await
    }

    async fn insert_email(&self, email: EmailDraft) -> Result<(), StoreError> {
        self.check(StoreWrite::Email)?;
        self.inner.insert_email(email).await
    }

    async fn get_business_profile(
        &self,
        profile_id: &BusinessProfileId,
    ) -> Result<BusinessProfile, StoreError> {
        self.inner.get_business_profile(profile_id).await
    }

    async fn get_automation_settings(
        &self,
        user_id: &UserId,
    ) -> Result<AutomationSettings, StoreError> {
        self.inner.get_automation_settings(user_id).await
    }

    async fn record_usage(&self, usage: UsageRecord) -> Result<(), StoreError> {
        self.inner.record_usage(usage).await
    }
}

// ========================================
// Scraper
// ========================================

enum ScrapeScript {
    /// Fail the first `n` calls, then answer the content.
    FailFirst(usize, String),
    AlwaysFail,
}

/// Scripted scraper. Optionally sleeps per call and tracks the peak number
/// of concurrent calls.
pub struct FakeScraper {
    script: ScrapeScript,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeScraper {
    fn build(script: ScrapeScript, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script,
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn ok(content: &str) -> Arc<Self> {
        Self::build(ScrapeScript::FailFirst(0, content.to_string()), Duration::ZERO)
    }

    pub fn failing_first(n: usize, content: &str) -> Arc<Self> {
        Self::build(ScrapeScript::FailFirst(n, content.to_string()), Duration::ZERO)
    }

    pub fn always_failing() -> Arc<Self> {
        Self::build(ScrapeScript::AlwaysFail, Duration::ZERO)
    }

    /// Succeeds after `latency`; use with paused time to measure concurrency.
    pub fn slow(content: &str, latency: Duration) -> Arc<Self> {
        Self::build(ScrapeScript::FailFirst(0, content.to_string()), latency)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn scrape(&self, _ctx: &StageContext, _url: &str) -> Result<String, StageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            ScrapeScript::FailFirst(failures, content) if n > *failures => Ok(content.clone()),
            _ => Err(StageError::upstream(
                Stage::Scrape,
                format!("upstream error #{n}"),
            )),
        }
    }
}

// ========================================
// Extractor
// ========================================

pub struct FakeExtractor {
    result: Result<ExtractedFields, StageError>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn returning(fields: ExtractedFields) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(fields),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err(StageError::invalid_response(Stage::Extract, "not json")),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        _ctx: &StageContext,
        _content: &str,
    ) -> Result<ExtractedFields, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// ========================================
// Briefing / Email generators
// ========================================

pub struct FakeBriefing {
    result: Result<String, StageError>,
    inputs: Mutex<Vec<String>>,
}

impl FakeBriefing {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err(StageError::upstream(Stage::Briefing, "rate limited")),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    /// Content each call was given.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl BriefingGenerator for FakeBriefing {
    async fn generate_briefing(
        &self,
        _ctx: &StageContext,
        input: &BriefingInput,
    ) -> Result<String, StageError> {
        self.inputs.lock().unwrap().push(input.content.clone());
        self.result.clone()
    }
}

pub struct FakeEmail {
    result: Result<GeneratedEmail, StageError>,
    briefings: Mutex<Vec<Option<String>>>,
}

impl FakeEmail {
    pub fn ok(subject: &str, body: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(GeneratedEmail {
                subject: subject.to_string(),
                body: body.to_string(),
            }),
            briefings: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Err(StageError::Timeout {
                stage: Stage::Email,
                after: Duration::from_secs(45),
            }),
            briefings: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.briefings.lock().unwrap().len()
    }

    /// Briefing text each call was given.
    pub fn briefings_seen(&self) -> Vec<Option<String>> {
        self.briefings.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailGenerator for FakeEmail {
    async fn generate_email(
        &self,
        _ctx: &StageContext,
        input: &EmailInput,
    ) -> Result<GeneratedEmail, StageError> {
        self.briefings.lock().unwrap().push(input.briefing.clone());
        self.result.clone()
    }
}
