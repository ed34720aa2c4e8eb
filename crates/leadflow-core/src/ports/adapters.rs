//! Stage adapter ports - 外部サービス（scraping / LLM）への 1 リクエスト
//!
//! 各 adapter は 1 回の呼び出しで完結する request/response。タイムアウトは
//! adapter 自身が持ち、リトライは呼び出し側（executor + retry）が持つ。
//!
//! # 設計原則
//! - adapter はタスク単位の状態を持たない
//! - 誰のための呼び出しか（task, user, lead, business profile）は
//!   毎回 `StageContext` で渡す
//! - そのため複数タスクが同じ adapter インスタンスを同時に使ってよい

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{BusinessProfile, ExtractedFields, Lead, LeadId, StageError, TaskId, UserId};

/// Per-call attribution and personalization context.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub lead_id: LeadId,
    pub business_profile: Option<Arc<BusinessProfile>>,
}

impl StageContext {
    /// Same task context, pointed at another lead.
    pub fn for_lead(&self, lead_id: &LeadId) -> Self {
        Self {
            lead_id: lead_id.clone(),
            ..self.clone()
        }
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.business_profile
            .as_deref()
            .and_then(|p| p.sender_name.as_deref())
    }
}

/// Input for briefing generation.
#[derive(Debug, Clone)]
pub struct BriefingInput {
    pub lead: Lead,
    /// Scraped website text, or the synthesized fallback profile.
    pub content: String,
}

/// Input for email generation.
#[derive(Debug, Clone)]
pub struct EmailInput {
    pub lead: Lead,
    /// Existing briefing used as extra grounding, when there is one.
    pub briefing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch `url` and reduce it to visible text.
    async fn scrape(&self, ctx: &StageContext, url: &str) -> Result<String, StageError>;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        ctx: &StageContext,
        content: &str,
    ) -> Result<ExtractedFields, StageError>;
}

#[async_trait]
pub trait BriefingGenerator: Send + Sync {
    async fn generate_briefing(
        &self,
        ctx: &StageContext,
        input: &BriefingInput,
    ) -> Result<String, StageError>;
}

#[async_trait]
pub trait EmailGenerator: Send + Sync {
    async fn generate_email(
        &self,
        ctx: &StageContext,
        input: &EmailInput,
    ) -> Result<GeneratedEmail, StageError>;
}
