//! LeadStore port - リード・タスク・成果物の正本（source of truth）
//!
//! LeadStore は以下を管理します：
//! - タスク（状態・進捗カウンタ・エラー）
//! - リード（エンリッチ結果、workflow status）
//! - 成果物（briefing, email draft）
//! - 送信者側コンテキスト（business profile, automation settings）
//! - 利用量（usage records）
//!
//! # 設計原則
//! - 冪等性の判定材料はここにしかない（task status, has_briefing, has_email）
//! - 実装は複数のリード処理から同時に呼ばれる（`Send + Sync`）
//! - 状態遷移の検証は store 側でも行う（terminal への更新は拒否）

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AutomationSettings, AutomationTask, Briefing, BusinessProfile, BusinessProfileId, EmailDraft,
    Lead, LeadId, StoreError, TaskId, TaskProgress, TaskRecord, TaskStatus, UsageRecord, UserId,
};

#[async_trait]
pub trait LeadStore: Send + Sync {
    // ---- tasks ----

    /// Insert a `pending` task. Returns `false` when the id already exists
    /// (the existing record is left untouched).
    async fn create_task(&self, task: &AutomationTask) -> Result<bool, StoreError>;

    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, StoreError>;

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus, StoreError>;

    /// Status + counters + optional error in one write.
    async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Mid-flight counters for a `processing` task.
    async fn update_progress(
        &self,
        task_id: &TaskId,
        progress: TaskProgress,
    ) -> Result<(), StoreError>;

    /// Auto-triggered tasks (priority medium) created for `user_id` at or
    /// after `since`.
    async fn count_auto_tasks_since(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    // ---- leads ----

    async fn get_lead(&self, lead_id: &LeadId) -> Result<Lead, StoreError>;

    /// Persist enrichment-derived fields (emails, phones, contact, address,
    /// social media).
    async fn update_lead_enrichment(&self, lead: &Lead) -> Result<(), StoreError>;

    async fn update_lead_workflow_status(
        &self,
        lead_id: &LeadId,
        status: &str,
    ) -> Result<(), StoreError>;

    // ---- artifacts ----

    async fn has_briefing(&self, lead_id: &LeadId) -> Result<bool, StoreError>;

    async fn get_briefing(&self, lead_id: &LeadId) -> Result<Option<Briefing>, StoreError>;

    async fn insert_briefing(&self, briefing: Briefing) -> Result<(), StoreError>;

    async fn has_email(&self, lead_id: &LeadId) -> Result<bool, StoreError>;

    async fn insert_email(&self, email: EmailDraft) -> Result<(), StoreError>;

    // ---- context ----

    async fn get_business_profile(
        &self,
        profile_id: &BusinessProfileId,
    ) -> Result<BusinessProfile, StoreError>;

    async fn get_automation_settings(
        &self,
        user_id: &UserId,
    ) -> Result<AutomationSettings, StoreError>;

    async fn record_usage(&self, usage: UsageRecord) -> Result<(), StoreError>;
}
