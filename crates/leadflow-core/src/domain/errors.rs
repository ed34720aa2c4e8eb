//! Errors - エラー型と分類
//!
//! 境界ごとに 1 つの enum:
//! - `StageError`: 1 リード・1 ステージの失敗（EnrichmentResult.error に文字列化される）
//! - `StoreError`: Lead Store の失敗
//! - `RequestError`: 受信リクエストの検証エラー

use std::time::Duration;

use super::outcome::Stage;
use super::task::TaskStatus;

/// StoreError は Lead Store 操作の失敗
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// StageError は 1 リードに対するステージ実行の失敗
///
/// # 分類
/// - 前提条件: `NoWebsite`, `NoContent`（リトライ無意味）
/// - 設定: `Unavailable`（認証情報なしでその機能だけ無効）
/// - 一時的: `Timeout`, `Upstream`（リトライ対象）
/// - 応答不正: `InvalidResponse`
/// - 永続化: `Persistence`（上流の作業はやり直さない）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("lead has no website")]
    NoWebsite,

    #[error("no content available for lead")]
    NoContent,

    #[error("{stage} is not configured")]
    Unavailable { stage: Stage },

    #[error("{stage} timed out after {}s", after.as_secs())]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} failed: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("{stage} returned an invalid response: {message}")]
    InvalidResponse { stage: Stage, message: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl StageError {
    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        StageError::Upstream {
            stage,
            message: message.into(),
        }
    }

    pub fn invalid_response(stage: Stage, message: impl Into<String>) -> Self {
        StageError::InvalidResponse {
            stage,
            message: message.into(),
        }
    }

    /// Transport-level failures that may succeed on a later attempt.
    ///
    /// Diagnostic only: the retry wrapper does not branch on it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Timeout { .. } | StageError::Upstream { .. })
    }
}

/// RequestError は受信リクエストの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("user_id must not be empty")]
    MissingUser,

    #[error("task has no leads to process")]
    NoLeads,

    #[error("lead id at position {0} is blank")]
    BlankLeadId(usize),

    #[error("max_retries {0} exceeds the limit of {max}", max = super::request::MAX_RETRIES_LIMIT)]
    TooManyRetries(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StageError::NoWebsite, false)]
    #[case(StageError::NoContent, false)]
    #[case(StageError::Unavailable { stage: Stage::Email }, false)]
    #[case(StageError::Timeout { stage: Stage::Scrape, after: Duration::from_secs(45) }, true)]
    #[case(StageError::upstream(Stage::Briefing, "429 Too Many Requests"), true)]
    #[case(StageError::invalid_response(Stage::Extract, "not json"), false)]
    #[case(StageError::Persistence(StoreError::Backend("down".into())), false)]
    fn retryable_classification(#[case] err: StageError, #[case] retryable: bool) {
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn messages_name_the_stage() {
        let err = StageError::Timeout {
            stage: Stage::Scrape,
            after: Duration::from_secs(45),
        };
        assert_eq!(err.to_string(), "scrape timed out after 45s");
        assert_eq!(StageError::NoWebsite.to_string(), "lead has no website");
    }
}
