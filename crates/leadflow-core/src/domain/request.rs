//! Incoming automation requests, validated at the boundary.
//!
//! Webhook bodies arrive as JSON tagged on `"kind"`:
//!
//! ```json
//! { "kind": "task", "user_id": "u1", "lead_ids": ["a", "b"], "task_type": "full_enrichment" }
//! { "kind": "new_lead", "user_id": "u1", "lead_id": "a" }
//! ```
//!
//! Malformed shapes fail deserialization; well-formed but invalid requests
//! fail [`AutomationRequest::validate`]. Neither reaches the dispatcher.

use serde::{Deserialize, Serialize};

use super::errors::RequestError;
use super::ids::{BusinessProfileId, LeadId, TaskId, UserId};
use super::task::{AutomationTask, DEFAULT_MAX_RETRIES, TaskPriority, TaskType};
use crate::ports::IdGenerator;

/// Upper bound accepted for a caller-supplied retry budget.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutomationRequest {
    /// Run a task over one or more existing leads.
    Task(TaskRequest),
    /// A lead was just created; run whatever the user's settings enable.
    NewLead(NewLeadRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskRequest {
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub user_id: UserId,
    #[serde(default)]
    pub lead_id: Option<LeadId>,
    #[serde(default)]
    pub lead_ids: Vec<LeadId>,
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub business_profile_id: Option<BusinessProfileId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLeadRequest {
    pub user_id: UserId,
    pub lead_id: LeadId,
}

/// Validated unit of work handed to the submission queue.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Task(AutomationTask),
    NewLead { user_id: UserId, lead_id: LeadId },
}

impl WorkItem {
    pub fn user_id(&self) -> &UserId {
        match self {
            WorkItem::Task(task) => &task.user_id,
            WorkItem::NewLead { user_id, .. } => user_id,
        }
    }
}

impl AutomationRequest {
    pub fn validate(&self) -> Result<(), RequestError> {
        match self {
            AutomationRequest::Task(req) => req.validate(),
            AutomationRequest::NewLead(req) => {
                if req.user_id.is_blank() {
                    return Err(RequestError::MissingUser);
                }
                if req.lead_id.is_blank() {
                    return Err(RequestError::BlankLeadId(0));
                }
                Ok(())
            }
        }
    }

    /// Validate and convert into a [`WorkItem`], generating a task id when
    /// the caller did not supply one.
    pub fn into_work_item(self, ids: &dyn IdGenerator) -> Result<WorkItem, RequestError> {
        self.validate()?;
        Ok(match self {
            AutomationRequest::Task(req) => WorkItem::Task(req.into_task(ids)),
            AutomationRequest::NewLead(req) => WorkItem::NewLead {
                user_id: req.user_id,
                lead_id: req.lead_id,
            },
        })
    }
}

impl TaskRequest {
    fn validate(&self) -> Result<(), RequestError> {
        if self.user_id.is_blank() {
            return Err(RequestError::MissingUser);
        }
        if self.lead_id.is_none() && self.lead_ids.is_empty() {
            return Err(RequestError::NoLeads);
        }
        // 位置は resolve_lead_ids と同じ順序（単一 id が先頭）
        let mut targets = self.lead_id.iter().chain(&self.lead_ids);
        if let Some(position) = targets.position(|id| id.is_blank()) {
            return Err(RequestError::BlankLeadId(position));
        }
        if let Some(retries) = self.max_retries
            && retries > MAX_RETRIES_LIMIT
        {
            return Err(RequestError::TooManyRetries(retries));
        }
        Ok(())
    }

    fn into_task(self, ids: &dyn IdGenerator) -> AutomationTask {
        let task_id = self
            .task_id
            .filter(|id| !id.is_blank())
            .unwrap_or_else(|| ids.generate_task_id());

        let mut task = AutomationTask::new(task_id, self.user_id, self.task_type)
            .with_leads(self.lead_ids)
            .with_priority(self.priority.unwrap_or_default())
            .with_max_retries(self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES));
        task.lead_id = self.lead_id;
        task.business_profile_id = self.business_profile_id;
        task
    }
}
