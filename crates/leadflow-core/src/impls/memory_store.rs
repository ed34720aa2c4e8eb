//! In-memory Lead Store.
//!
//! Used by the CLI demo and by tests. Besides the `LeadStore` contract it
//! keeps a per-task history of every counter write, so progress can be
//! inspected after the fact.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{
    AutomationSettings, AutomationTask, Briefing, BusinessProfile, BusinessProfileId, EmailDraft,
    Lead, LeadId, StoreError, TaskId, TaskPriority, TaskProgress, TaskRecord, TaskStatus,
    UsageRecord, UserId,
};
use crate::ports::{Clock, LeadStore, SystemClock};

/// Initial contents for an in-memory store (e.g. a JSON fixture).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub business_profiles: Vec<BusinessProfile>,
    #[serde(default)]
    pub automation_settings: Vec<AutomationSettings>,
    #[serde(default)]
    pub briefings: Vec<Briefing>,
    #[serde(default)]
    pub emails: Vec<EmailDraft>,
}

#[derive(Default)]
struct StoreState {
    tasks: HashMap<TaskId, TaskRecord>,
    /// Every counter snapshot written for a task, in write order.
    progress_history: HashMap<TaskId, Vec<TaskProgress>>,
    leads: HashMap<LeadId, Lead>,
    briefings: HashMap<LeadId, Briefing>,
    emails: HashMap<LeadId, EmailDraft>,
    profiles: HashMap<BusinessProfileId, BusinessProfile>,
    settings: HashMap<UserId, AutomationSettings>,
    usage: Vec<UsageRecord>,
}

impl StoreState {
    fn task_mut(&mut self, task_id: &TaskId) -> Result<&mut TaskRecord, StoreError> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::not_found("task", task_id))
    }

    fn push_history(&mut self, task_id: &TaskId, progress: TaskProgress) {
        self.progress_history
            .entry(task_id.clone())
            .or_default()
            .push(progress);
    }
}

/// `LeadStore` backed by hash maps behind one async mutex.
#[derive(Clone)]
pub struct InMemoryLeadStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
    fail_status_reads: Arc<AtomicBool>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
            fail_status_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn seeded(seed: StoreSeed, clock: Arc<dyn Clock>) -> Self {
        let state = StoreState {
            leads: seed.leads.into_iter().map(|l| (l.id.clone(), l)).collect(),
            profiles: seed
                .business_profiles
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            settings: seed
                .automation_settings
                .into_iter()
                .map(|s| (s.user_id.clone(), s))
                .collect(),
            briefings: seed
                .briefings
                .into_iter()
                .map(|b| (b.lead_id.clone(), b))
                .collect(),
            emails: seed
                .emails
                .into_iter()
                .map(|e| (e.lead_id.clone(), e))
                .collect(),
            ..StoreState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
            fail_status_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make `get_task_status` answer a backend error until switched back.
    pub fn set_fail_status_reads(&self, fail: bool) {
        self.fail_status_reads.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_lead(&self, lead: Lead) {
        self.state.lock().await.leads.insert(lead.id.clone(), lead);
    }

    pub async fn insert_business_profile(&self, profile: BusinessProfile) {
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.id.clone(), profile);
    }

    pub async fn put_automation_settings(&self, settings: AutomationSettings) {
        self.state
            .lock()
            .await
            .settings
            .insert(settings.user_id.clone(), settings);
    }

    pub async fn progress_history(&self, task_id: &TaskId) -> Vec<TaskProgress> {
        self.state
            .lock()
            .await
            .progress_history
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn email_draft(&self, lead_id: &LeadId) -> Option<EmailDraft> {
        self.state.lock().await.emails.get(lead_id).cloned()
    }

    pub async fn usage(&self) -> Vec<UsageRecord> {
        self.state.lock().await.usage.clone()
    }

    pub async fn tasks(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut tasks: Vec<TaskRecord> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

impl Default for InMemoryLeadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn create_task(&self, task: &AutomationTask) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.task_id) {
            return Ok(false);
        }
        state
            .tasks
            .insert(task.task_id.clone(), TaskRecord::new(task.clone(), now));
        Ok(true)
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, StoreError> {
        self.state
            .lock()
            .await
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("task", task_id))
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus, StoreError> {
        if self.fail_status_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("status read unavailable".to_string()));
        }
        Ok(self.get_task(task_id).await?.status())
    }

    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.task_mut(task_id)?;
        record.transition(status, progress, error, now)?;
        let written = record.progress();
        state.push_history(task_id, written);
        Ok(())
    }

    async fn update_progress(
        &self,
        task_id: &TaskId,
        progress: TaskProgress,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state.task_mut(task_id)?;
        record.advance_progress(progress)?;
        let written = record.progress();
        state.push_history(task_id, written);
        Ok(())
    }

    async fn count_auto_tasks_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|r| {
                &r.task.user_id == user_id
                    && r.task.priority == TaskPriority::Medium
                    && r.created_at >= since
            })
            .count())
    }

    async fn get_lead(&self, lead_id: &LeadId) -> Result<Lead, StoreError> {
        self.state
            .lock()
            .await
            .leads
            .get(lead_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("lead", lead_id))
    }

    async fn update_lead_enrichment(&self, lead: &Lead) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .leads
            .get_mut(&lead.id)
            .ok_or_else(|| StoreError::not_found("lead", &lead.id))?;
        stored.emails.clone_from(&lead.emails);
        stored.phones.clone_from(&lead.phones);
        stored.contact_name.clone_from(&lead.contact_name);
        stored.contact_role.clone_from(&lead.contact_role);
        stored.address.clone_from(&lead.address);
        stored.social_media.clone_from(&lead.social_media);
        Ok(())
    }

    async fn update_lead_workflow_status(
        &self,
        lead_id: &LeadId,
        status: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let lead = state
            .leads
            .get_mut(lead_id)
            .ok_or_else(|| StoreError::not_found("lead", lead_id))?;
        lead.workflow_status = Some(status.to_string());
        Ok(())
    }

    async fn has_briefing(&self, lead_id: &LeadId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.briefings.contains_key(lead_id))
    }

    async fn get_briefing(&self, lead_id: &LeadId) -> Result<Option<Briefing>, StoreError> {
        Ok(self.state.lock().await.briefings.get(lead_id).cloned())
    }

    async fn insert_briefing(&self, briefing: Briefing) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .briefings
            .insert(briefing.lead_id.clone(), briefing);
        Ok(())
    }

    async fn has_email(&self, lead_id: &LeadId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.emails.contains_key(lead_id))
    }

    async fn insert_email(&self, email: EmailDraft) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .emails
            .insert(email.lead_id.clone(), email);
        Ok(())
    }

    async fn get_business_profile(
        &self,
        profile_id: &BusinessProfileId,
    ) -> Result<BusinessProfile, StoreError> {
        self.state
            .lock()
            .await
            .profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("business profile", profile_id))
    }

    async fn get_automation_settings(
        &self,
        user_id: &UserId,
    ) -> Result<AutomationSettings, StoreError> {
        self.state
            .lock()
            .await
            .settings
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("automation settings", user_id))
    }

    async fn record_usage(&self, usage: UsageRecord) -> Result<(), StoreError> {
        self.state.lock().await.usage.push(usage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};

    fn task(id: &str) -> AutomationTask {
        AutomationTask::new(id.into(), "u1".into(), TaskType::LeadEnrichment).with_leads(["a", "b"])
    }

    #[tokio::test]
    async fn create_task_is_insert_if_absent() {
        let store = InMemoryLeadStore::new();
        assert!(store.create_task(&task("t1")).await.unwrap());
        assert!(!store.create_task(&task("t1")).await.unwrap());
        assert_eq!(
            store.get_task_status(&"t1".into()).await.unwrap(),
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn status_writes_follow_the_state_machine() {
        let store = InMemoryLeadStore::new();
        store.create_task(&task("t1")).await.unwrap();
        let id = TaskId::new("t1");

        store
            .update_task_status(&id, TaskStatus::Processing, TaskProgress::new(2), None)
            .await
            .unwrap();
        store
            .update_task_status(&id, TaskStatus::Completed, TaskProgress::new(2), None)
            .await
            .unwrap();

        let err = store
            .update_task_status(&id, TaskStatus::Processing, TaskProgress::new(2), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.progress_history(&id).await.len(), 2);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let store = InMemoryLeadStore::new();
        let err = store.get_lead(&"nope".into()).await.unwrap_err();
        assert_eq!(err.to_string(), "lead not found: nope");
    }

    #[tokio::test]
    async fn status_read_fault_can_be_injected() {
        let store = InMemoryLeadStore::new();
        store.create_task(&task("t1")).await.unwrap();
        store.set_fail_status_reads(true);
        assert!(matches!(
            store.get_task_status(&"t1".into()).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn auto_tasks_are_counted_per_user_since_cutoff() {
        let today = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let store = InMemoryLeadStore::with_clock(Arc::new(FixedClock::new(today)));

        let auto = task("t1").with_priority(TaskPriority::Medium);
        let manual = task("t2");
        let mut other_user = task("t3").with_priority(TaskPriority::Medium);
        other_user.user_id = "u2".into();
        for t in [&auto, &manual, &other_user] {
            store.create_task(t).await.unwrap();
        }

        let user = UserId::new("u1");
        assert_eq!(
            store
                .count_auto_tasks_since(&user, today - Duration::hours(1))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count_auto_tasks_since(&user, today + Duration::hours(1))
                .await
                .unwrap(),
            0
        );
    }
}
