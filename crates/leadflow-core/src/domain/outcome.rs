//! Per-lead results and the task-level aggregate rule.
//!
//! This module does not know about executors, stores or concurrency. It only
//! defines the shape of a lead's outcome and how a batch of outcomes folds
//! into counters and a terminal status.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::LeadId;
use super::task::{TaskProgress, TaskStatus};

/// Adapter call a failure or usage record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scrape,
    Extract,
    Briefing,
    Email,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Extract => "extract",
            Stage::Briefing => "briefing",
            Stage::Email => "email",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one lead within one task.
///
/// `enriched`, `briefed` and `emailed` are independent: a briefing can be
/// produced for a lead whose enrichment failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub lead_id: LeadId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enriched: bool,
    pub briefed: bool,
    pub emailed: bool,
}

impl EnrichmentResult {
    pub fn new(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            ..Self::default()
        }
    }

    pub fn failed(lead_id: LeadId, error: impl Into<String>) -> Self {
        Self {
            lead_id,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn enriched(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            success: true,
            enriched: true,
            ..Self::default()
        }
    }

    pub fn briefed(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            success: true,
            briefed: true,
            ..Self::default()
        }
    }

    pub fn emailed(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            success: true,
            emailed: true,
            ..Self::default()
        }
    }
}

/// Succeeded/failed counts over the results written so far.
pub fn tally<'a, I>(results: I) -> (usize, usize)
where
    I: IntoIterator<Item = &'a EnrichmentResult>,
{
    results
        .into_iter()
        .fold((0, 0), |(ok, failed), result| {
            if result.success {
                (ok + 1, failed)
            } else {
                (ok, failed + 1)
            }
        })
}

/// Terminal status for a finished batch.
///
/// `Failed` only when every result failed (or there were none); any success
/// makes the task `Completed`.
pub fn aggregate_status(results: &[EnrichmentResult]) -> TaskStatus {
    if results.iter().any(|r| r.success) {
        TaskStatus::Completed
    } else {
        TaskStatus::Failed
    }
}

/// Final counters for a finished batch.
pub fn final_progress(total: usize, results: &[EnrichmentResult]) -> TaskProgress {
    let (succeeded, failed) = tally(results);
    TaskProgress {
        total,
        processed: results.len(),
        succeeded,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn results(flags: &[bool]) -> Vec<EnrichmentResult> {
        flags
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                let id = LeadId::new(format!("lead-{i}"));
                if *ok {
                    EnrichmentResult::enriched(id)
                } else {
                    EnrichmentResult::failed(id, "boom")
                }
            })
            .collect()
    }

    #[rstest]
    #[case(&[true, false, true], TaskStatus::Completed)]
    #[case(&[false, false], TaskStatus::Failed)]
    #[case(&[false, false, true], TaskStatus::Completed)]
    #[case(&[true], TaskStatus::Completed)]
    #[case(&[], TaskStatus::Failed)]
    fn aggregate_status_rule(#[case] flags: &[bool], #[case] expected: TaskStatus) {
        assert_eq!(aggregate_status(&results(flags)), expected);
    }

    #[test]
    fn final_progress_counts_every_result() {
        let progress = final_progress(3, &results(&[true, false, true]));
        assert_eq!(
            progress,
            TaskProgress {
                total: 3,
                processed: 3,
                succeeded: 2,
                failed: 1
            }
        );
    }
}
