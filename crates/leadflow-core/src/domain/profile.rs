//! Sender-side context: business profiles and per-user automation settings.

use serde::{Deserialize, Serialize};

use super::ids::{BusinessProfileId, UserId};
use super::task::TaskType;

/// The sender's company, used to personalize briefings and emails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub id: BusinessProfileId,
    pub user_id: UserId,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_solved: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differentials: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Which automations fire when a new lead is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationSettings {
    pub user_id: UserId,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_enrich: bool,
    #[serde(default)]
    pub auto_briefing: bool,
    #[serde(default)]
    pub auto_email: bool,
    /// Max auto-created tasks per user per UTC day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_business_profile_id: Option<BusinessProfileId>,
}

impl AutomationSettings {
    /// Task type implied by the enabled automations, or `None` when nothing
    /// should run.
    pub fn derived_task_type(&self) -> Option<TaskType> {
        if !self.enabled {
            return None;
        }
        match (self.auto_enrich, self.auto_briefing, self.auto_email) {
            (false, false, false) => None,
            (true, false, false) => Some(TaskType::LeadEnrichment),
            (false, true, false) => Some(TaskType::PrecallGeneration),
            (false, false, true) => Some(TaskType::EmailGeneration),
            _ => Some(TaskType::FullEnrichment),
        }
    }
}
