//! Status - 1 回の dispatch の結果サマリ
//!
//! 呼び出し側に返す値ではなく（結果は store で観測する）、ログと CLI の表示用。

use std::time::Duration;

use serde::Serialize;

use crate::domain::{EnrichmentResult, TaskId, TaskProgress, TaskStatus};

/// Outcome of one dispatch that actually ran.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub results: Vec<EnrichmentResult>,
}

impl RunSummary {
    pub fn new(
        task_id: TaskId,
        status: TaskStatus,
        progress: TaskProgress,
        error: Option<String>,
        duration: Duration,
        results: Vec<EnrichmentResult>,
    ) -> Self {
        Self {
            task_id,
            status,
            progress,
            error,
            duration_ms: duration.as_millis() as u64,
            results,
        }
    }

    /// Mean wall time per lead (0 for an empty task).
    pub fn avg_ms_per_lead(&self) -> u64 {
        match self.progress.total {
            0 => 0,
            n => self.duration_ms / n as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_handles_empty_tasks() {
        let summary = RunSummary::new(
            "t1".into(),
            TaskStatus::Failed,
            TaskProgress::default(),
            Some("no leads to process".into()),
            Duration::from_millis(12),
            Vec::new(),
        );
        assert_eq!(summary.avg_ms_per_lead(), 0);
    }

    #[test]
    fn average_divides_by_total() {
        let summary = RunSummary::new(
            "t1".into(),
            TaskStatus::Completed,
            TaskProgress {
                total: 4,
                processed: 4,
                succeeded: 4,
                failed: 0,
            },
            None,
            Duration::from_millis(2000),
            Vec::new(),
        );
        assert_eq!(summary.avg_ms_per_lead(), 500);
    }
}
