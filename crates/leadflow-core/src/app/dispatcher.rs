//! Task dispatcher - タスク状態機械の所有者
//!
//! # 責務
//! - 冪等性チェック（pending 以外なら何もしない）
//! - pending -> processing -> completed | failed の遷移
//! - task_type からステージの組み合わせを選ぶ
//! - 結果の集計と最終状態の書き込み
//!
//! タスク単位のリトライはない。リトライは executor の adapter 呼び出しの中だけ。
//!
//! ```text
//! enrich / full     : BatchRunner::run_concurrent（scrape がボトルネック）
//! precall / email   : BatchRunner::run_sequential（LLM 1 回ずつ、入力順）
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::batch::BatchRunner;
use super::executor::StageExecutor;
use super::retry::RetryPolicy;
use super::status::RunSummary;
use crate::domain::{
    AutomationSettings, AutomationTask, BusinessProfile, EnrichmentResult, LeadId, StoreError,
    TaskId, TaskPriority, TaskProgress, TaskStatus, TaskType, UserId, WorkItem, aggregate_status,
    final_progress,
};
use crate::ports::{Clock, IdGenerator, LeadStore, StageContext};

/// Error recorded on a task whose lead set resolved empty.
pub const NO_LEADS_ERROR: &str = "no leads to process";

pub struct TaskDispatcher {
    store: Arc<dyn LeadStore>,
    executor: Arc<StageExecutor>,
    batch: BatchRunner,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskDispatcher {
    pub fn new(
        store: Arc<dyn LeadStore>,
        executor: Arc<StageExecutor>,
        batch: BatchRunner,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            executor,
            batch,
            retry,
            clock,
            ids,
        }
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    /// Drive `task` to a terminal state.
    ///
    /// Returns `None` when the task was already claimed (not `pending`) and
    /// nothing ran. All outcomes are written to the store either way; the
    /// summary is for logging and the CLI.
    #[instrument(skip_all, fields(task_id = %task.task_id, task_type = %task.task_type))]
    pub async fn dispatch(&self, task: &AutomationTask) -> Option<RunSummary> {
        let started = Instant::now();
        let task_id = &task.task_id;

        // 1. idempotency（読めなければ fail open）
        match self.store.get_task_status(task_id).await {
            Ok(TaskStatus::Pending) => {}
            Ok(status) => {
                info!(%status, "task already claimed, skipping");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "could not read task status, proceeding");
            }
        }

        // 2-3. claim with the final total
        let lead_ids = task.resolve_lead_ids();
        let total = lead_ids.len();
        match self
            .store
            .update_task_status(task_id, TaskStatus::Processing, TaskProgress::new(total), None)
            .await
        {
            Ok(()) => {}
            Err(err @ StoreError::InvalidTransition { .. }) => {
                info!(error = %err, "task claimed concurrently, skipping");
                return None;
            }
            Err(err) => warn!(error = %err, "could not mark task processing, proceeding"),
        }
        info!(total, "task processing");

        if lead_ids.is_empty() {
            warn!("{NO_LEADS_ERROR}");
            self.persist_final(
                task_id,
                TaskStatus::Failed,
                TaskProgress::default(),
                Some(NO_LEADS_ERROR.to_string()),
            )
            .await;
            return Some(RunSummary::new(
                task_id.clone(),
                TaskStatus::Failed,
                TaskProgress::default(),
                Some(NO_LEADS_ERROR.to_string()),
                started.elapsed(),
                Vec::new(),
            ));
        }

        // 4. context for this task only; dropped on every exit path
        let ctx = StageContext {
            task_id: task_id.clone(),
            user_id: task.user_id.clone(),
            lead_id: lead_ids[0].clone(),
            business_profile: self.load_profile(task).await,
        };
        let policy = self.retry.with_max_retries(task.max_retries);

        // 5. stages
        let mut results = self.run_stages(task.task_type, &ctx, policy, &lead_ids).await;

        // 6. aggregate
        let mut errors = Vec::new();
        for result in &mut results {
            if let Some(err) = result.error.take() {
                let err = format!("lead {}: {err}", result.lead_id);
                if !result.success {
                    errors.push(err.clone());
                }
                result.error = Some(err);
            }
        }
        let status = aggregate_status(&results);
        let progress = final_progress(total, &results);
        let error = (!errors.is_empty()).then(|| errors.join("; "));

        // 7. persist + summary
        self.persist_final(task_id, status, progress, error.clone()).await;

        let summary = RunSummary::new(
            task_id.clone(),
            status,
            progress,
            error,
            started.elapsed(),
            results,
        );
        info!(
            duration_ms = summary.duration_ms,
            avg_ms_per_lead = summary.avg_ms_per_lead(),
            succeeded = progress.succeeded,
            failed = progress.failed,
            total = progress.total,
            status = %status,
            "task finished"
        );
        Some(summary)
    }

    /// Auto-enrichment entry point for a newly created lead.
    ///
    /// Builds a single-lead task from the user's settings, persists it and
    /// runs it inline. Returns the task id, or `None` when settings disable
    /// every stage or the daily limit is reached.
    #[instrument(skip_all, fields(user_id = %user_id, lead_id = %lead_id))]
    pub async fn dispatch_new_lead(
        &self,
        user_id: &UserId,
        lead_id: &LeadId,
        settings: &AutomationSettings,
    ) -> Option<TaskId> {
        let Some(task_type) = settings.derived_task_type() else {
            debug!("no automation enabled for user");
            return None;
        };

        if let Some(limit) = settings.daily_limit {
            let now = self.clock.now();
            let since = now.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
            match self.store.count_auto_tasks_since(user_id, since).await {
                Ok(count) if count >= limit as usize => {
                    info!(count, limit, "daily automation limit reached");
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "could not count today's tasks, not dispatching");
                    return None;
                }
            }
        }

        let mut task = AutomationTask::new(self.ids.generate_task_id(), user_id.clone(), task_type)
            .with_lead(lead_id.clone())
            .with_priority(TaskPriority::Medium)
            .with_max_retries(self.retry.max_retries);
        task.business_profile_id = settings.default_business_profile_id.clone();

        if let Err(err) = self.store.create_task(&task).await {
            warn!(error = %err, "could not create auto-enrichment task");
            return None;
        }
        info!(task_id = %task.task_id, %task_type, "auto-enrichment task created");

        self.dispatch(&task).await;
        Some(task.task_id)
    }

    /// Run one queued work item.
    pub async fn run_item(&self, item: WorkItem) {
        match item {
            WorkItem::Task(task) => {
                match self.store.create_task(&task).await {
                    Ok(true) => debug!(task_id = %task.task_id, "task registered"),
                    Ok(false) => debug!(task_id = %task.task_id, "task already known"),
                    Err(err) => warn!(task_id = %task.task_id, error = %err, "could not register task"),
                }
                self.dispatch(&task).await;
            }
            WorkItem::NewLead { user_id, lead_id } => {
                match self.store.get_automation_settings(&user_id).await {
                    Ok(settings) => {
                        self.dispatch_new_lead(&user_id, &lead_id, &settings).await;
                    }
                    Err(err) => {
                        debug!(user_id = %user_id, error = %err, "no automation settings, skipping new lead");
                    }
                }
            }
        }
    }

    async fn run_stages(
        &self,
        task_type: TaskType,
        ctx: &StageContext,
        policy: RetryPolicy,
        lead_ids: &[LeadId],
    ) -> Vec<EnrichmentResult> {
        let task_id = &ctx.task_id;
        match task_type {
            TaskType::LeadEnrichment | TaskType::FullEnrichment => {
                let executor = Arc::clone(&self.executor);
                let ctx = ctx.clone();
                let full = task_type == TaskType::FullEnrichment;
                self.batch
                    .run_concurrent(task_id, lead_ids, move |lead_id| {
                        let executor = Arc::clone(&executor);
                        let ctx = ctx.for_lead(&lead_id);
                        async move {
                            if full {
                                executor.full(&ctx, &policy).await
                            } else {
                                executor.enrich(&ctx, &policy).await
                            }
                        }
                    })
                    .await
            }
            TaskType::PrecallGeneration => {
                self.batch
                    .run_sequential(task_id, lead_ids, |lead_id| {
                        let ctx = ctx.for_lead(&lead_id);
                        async move { self.executor.brief(&ctx, &policy).await }
                    })
                    .await
            }
            TaskType::EmailGeneration => {
                self.batch
                    .run_sequential(task_id, lead_ids, |lead_id| {
                        let ctx = ctx.for_lead(&lead_id);
                        async move { self.executor.email(&ctx, &policy).await }
                    })
                    .await
            }
        }
    }

    async fn load_profile(&self, task: &AutomationTask) -> Option<Arc<BusinessProfile>> {
        let profile_id = task.business_profile_id.as_ref()?;
        match self.store.get_business_profile(profile_id).await {
            Ok(profile) => Some(Arc::new(profile)),
            Err(err) => {
                warn!(profile_id = %profile_id, error = %err, "business profile unavailable, continuing without it");
                None
            }
        }
    }

    async fn persist_final(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
    ) {
        if let Err(err) = self
            .store
            .update_task_status(task_id, status, progress, error)
            .await
        {
            warn!(task_id = %task_id, %status, error = %err, "could not persist final task status");
        }
    }
}
