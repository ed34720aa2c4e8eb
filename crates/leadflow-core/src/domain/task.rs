//! Automation task: the unit of work handed to the dispatcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ids::{BusinessProfileId, LeadId, TaskId, UserId};

/// Default per-stage retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Which stage executors a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Scrape + extract contact data.
    LeadEnrichment,
    /// Pre-call briefing only.
    PrecallGeneration,
    /// Cold email only.
    EmailGeneration,
    /// Enrich, then brief, then email, per lead.
    FullEnrichment,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::LeadEnrichment => "lead_enrichment",
            TaskType::PrecallGeneration => "precall_generation",
            TaskType::EmailGeneration => "email_generation",
            TaskType::FullEnrichment => "full_enrichment",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead_enrichment" => Ok(TaskType::LeadEnrichment),
            "precall_generation" => Ok(TaskType::PrecallGeneration),
            "email_generation" => Ok(TaskType::EmailGeneration),
            "full_enrichment" => Ok(TaskType::FullEnrichment),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

/// Advisory priority rank. Not consumed by any scheduler here.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Operator-initiated search jobs.
    High = 1,
    /// Auto-triggered enrichment.
    Medium = 2,
    /// Manual batch operations.
    #[default]
    Low = 3,
}

impl TaskPriority {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Task status.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed
///
/// Completed and Failed are terminal. Anything other than Pending counts as
/// already claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Is `next` a legal successor of `self`?
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters, non-decreasing while a task is processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TaskProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

/// A unit of automation work covering one or more leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationTask {
    pub task_id: TaskId,
    pub user_id: UserId,

    /// Single target lead (resolved first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,

    /// Ordered batch of target leads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lead_ids: Vec<LeadId>,

    pub task_type: TaskType,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default = "default_status")]
    pub status: TaskStatus,

    #[serde(default)]
    pub progress: TaskProgress,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_profile_id: Option<BusinessProfileId>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl AutomationTask {
    pub fn new(task_id: TaskId, user_id: UserId, task_type: TaskType) -> Self {
        Self {
            task_id,
            user_id,
            lead_id: None,
            lead_ids: Vec::new(),
            task_type,
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            progress: TaskProgress::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            business_profile_id: None,
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<LeadId>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_leads<I, L>(mut self, lead_ids: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LeadId>,
    {
        self.lead_ids = lead_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_business_profile(mut self, profile_id: impl Into<BusinessProfileId>) -> Self {
        self.business_profile_id = Some(profile_id.into());
        self
    }

    /// Leads to process: the union of the single id and the list, single id
    /// first, in input order. Each lead appears once.
    pub fn resolve_lead_ids(&self) -> Vec<LeadId> {
        let mut ids: Vec<LeadId> = Vec::with_capacity(self.lead_ids.len() + 1);
        for id in self.lead_id.iter().chain(&self.lead_ids) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
