//! Store-side records: task bookkeeping and usage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::StoreError;
use super::ids::{LeadId, TaskId, UserId};
use super::outcome::Stage;
use super::task::{AutomationTask, TaskProgress, TaskStatus};

/// Persisted state of one automation task.
///
/// Design:
/// - All status changes go through [`TaskRecord::transition`], which enforces
///   the state machine and rejects anything after a terminal state.
/// - Progress pushed while processing never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: AutomationTask,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task: AutomationTask, now: DateTime<Utc>) -> Self {
        Self {
            task,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status
    }

    pub fn progress(&self) -> TaskProgress {
        self.task.progress
    }

    /// Move to `next`, replacing counters and error.
    ///
    /// Entering `processing` is only possible from `pending`, so exactly one
    /// caller can claim a task; it sets the counters (zeros with the final
    /// total).
    pub fn transition(
        &mut self,
        next: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let current = self.task.status;
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        self.task.status = next;
        self.task.progress = progress;
        self.error = error;
        if current == TaskStatus::Pending {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    /// Apply an in-flight progress snapshot, clamped to be non-decreasing.
    pub fn advance_progress(&mut self, progress: TaskProgress) -> Result<(), StoreError> {
        let current = self.task.status;
        if current != TaskStatus::Processing {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: TaskStatus::Processing,
            });
        }

        let p = &mut self.task.progress;
        p.total = p.total.max(progress.total);
        p.processed = p.processed.max(progress.processed).min(p.total);
        p.succeeded = p.succeeded.max(progress.succeeded);
        p.failed = p.failed.max(progress.failed);
        Ok(())
    }
}

/// One adapter call attributed to a user, for usage accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub lead_id: LeadId,
    pub stage: Stage,
    pub success: bool,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}
