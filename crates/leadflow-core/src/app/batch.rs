//! Concurrency controller: fans a batch of leads out to a per-lead function
//! and folds the results back in.
//!
//! # 設計原則
//! - 同時実行数は Semaphore だけで制限する（バッチサイズに依存しない）
//! - 結果は入力位置に書き込む（完了順ではなく入力順で返る）
//! - 進捗の再計算と store への push は 1 つの Mutex の中で行う
//!   （store から見える進捗が逆戻りしない）
//! - 失敗したリードがあってもバッチは止めない。全員の完了を待つ

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::domain::{EnrichmentResult, LeadId, TaskId, TaskProgress, tally};
use crate::ports::LeadStore;

/// Default cap on concurrently running leads.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Results written so far, plus the counters derived from them.
struct ProgressTracker {
    store: Arc<dyn LeadStore>,
    task_id: TaskId,
    lead_ids: Vec<LeadId>,
    results: Vec<Option<EnrichmentResult>>,
    processed: usize,
}

impl ProgressTracker {
    fn new(store: Arc<dyn LeadStore>, task_id: TaskId, lead_ids: Vec<LeadId>) -> Self {
        let total = lead_ids.len();
        Self {
            store,
            task_id,
            lead_ids,
            results: vec![None; total],
            processed: 0,
        }
    }

    /// Store `result` at `index`, recompute counters and push them.
    async fn record(&mut self, index: usize, result: EnrichmentResult) {
        self.results[index] = Some(result);
        self.processed += 1;

        let (succeeded, failed) = tally(self.results.iter().flatten());
        let progress = TaskProgress {
            total: self.results.len(),
            processed: self.processed,
            succeeded,
            failed,
        };
        debug!(
            task_id = %self.task_id,
            processed = progress.processed,
            total = progress.total,
            succeeded,
            failed,
            "progress"
        );
        if let Err(err) = self.store.update_progress(&self.task_id, progress).await {
            warn!(task_id = %self.task_id, error = %err, "failed to push progress");
        }
    }

    /// Results in input order. A slot left empty (the unit of work panicked)
    /// becomes a failed result.
    fn finish(self) -> Vec<EnrichmentResult> {
        self.results
            .into_iter()
            .zip(self.lead_ids)
            .map(|(slot, lead_id)| {
                slot.unwrap_or_else(|| {
                    EnrichmentResult::failed(lead_id, "lead processing aborted unexpectedly")
                })
            })
            .collect()
    }
}

/// Runs per-lead work either concurrently under a semaphore or one lead at a
/// time, pushing progress to the store after every lead.
#[derive(Clone)]
pub struct BatchRunner {
    store: Arc<dyn LeadStore>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn LeadStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// One spawned unit of work per lead, at most `concurrency` running.
    pub async fn run_concurrent<F, Fut>(
        &self,
        task_id: &TaskId,
        lead_ids: &[LeadId],
        per_lead: F,
    ) -> Vec<EnrichmentResult>
    where
        F: Fn(LeadId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EnrichmentResult> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let tracker = Arc::new(Mutex::new(ProgressTracker::new(
            Arc::clone(&self.store),
            task_id.clone(),
            lead_ids.to_vec(),
        )));
        let per_lead = Arc::new(per_lead);

        let mut set = JoinSet::new();
        for (index, lead_id) in lead_ids.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let tracker = Arc::clone(&tracker);
            let per_lead = Arc::clone(&per_lead);

            set.spawn(async move {
                // semaphore は close しないので Err にはならない
                let permit = semaphore.acquire_owned().await.ok();
                let result = per_lead(lead_id).await;
                drop(permit);

                tracker.lock().await.record(index, result).await;
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                error!(task_id = %task_id, error = %err, "lead worker panicked");
            }
        }

        let mut guard = tracker.lock().await;
        let empty = ProgressTracker::new(Arc::clone(&self.store), task_id.clone(), Vec::new());
        std::mem::replace(&mut *guard, empty).finish()
    }

    /// Leads in input order, one at a time.
    pub async fn run_sequential<F, Fut>(
        &self,
        task_id: &TaskId,
        lead_ids: &[LeadId],
        mut per_lead: F,
    ) -> Vec<EnrichmentResult>
    where
        F: FnMut(LeadId) -> Fut,
        Fut: Future<Output = EnrichmentResult>,
    {
        let mut tracker =
            ProgressTracker::new(Arc::clone(&self.store), task_id.clone(), lead_ids.to_vec());
        for (index, lead_id) in lead_ids.iter().cloned().enumerate() {
            let result = per_lead(lead_id).await;
            tracker.record(index, result).await;
        }
        tracker.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AutomationTask, TaskStatus, TaskType};
    use crate::impls::InMemoryLeadStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn processing_task(store: &InMemoryLeadStore, id: &str, n: usize) -> (TaskId, Vec<LeadId>) {
        let lead_ids: Vec<LeadId> = (0..n).map(|i| LeadId::new(format!("lead-{i}"))).collect();
        let task = AutomationTask::new(id.into(), "u1".into(), TaskType::LeadEnrichment)
            .with_leads(lead_ids.clone());
        store.create_task(&task).await.unwrap();
        store
            .update_task_status(&task.task_id, TaskStatus::Processing, TaskProgress::new(n), None)
            .await
            .unwrap();
        (task.task_id, lead_ids)
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_the_concurrency_cap() {
        let store = InMemoryLeadStore::new();
        let (task_id, lead_ids) = processing_task(&store, "t1", 23).await;
        let runner = BatchRunner::new(Arc::new(store.clone()), DEFAULT_CONCURRENCY);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_c, peak_c) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let results = runner
            .run_concurrent(&task_id, &lead_ids, move |lead_id| {
                let in_flight = Arc::clone(&in_flight_c);
                let peak = Arc::clone(&peak_c);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    EnrichmentResult::enriched(lead_id)
                }
            })
            .await;

        assert_eq!(results.len(), 23);
        assert_eq!(peak.load(Ordering::SeqCst), DEFAULT_CONCURRENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_input_order() {
        let store = InMemoryLeadStore::new();
        let (task_id, lead_ids) = processing_task(&store, "t1", 8).await;
        let runner = BatchRunner::new(Arc::new(store.clone()), 3);

        // 後ろのリードほど早く終わる
        let results = runner
            .run_concurrent(&task_id, &lead_ids, |lead_id| async move {
                let i: u64 = lead_id.as_str().trim_start_matches("lead-").parse().unwrap();
                tokio::time::sleep(Duration::from_millis(100 - i * 10)).await;
                if i % 2 == 0 {
                    EnrichmentResult::enriched(lead_id)
                } else {
                    EnrichmentResult::failed(lead_id, "odd")
                }
            })
            .await;

        let ids: Vec<&LeadId> = results.iter().map(|r| &r.lead_id).collect();
        assert_eq!(ids, lead_ids.iter().collect::<Vec<_>>());
        assert!(results[0].success && !results[1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_snapshots_are_monotonic() {
        let store = InMemoryLeadStore::new();
        let (task_id, lead_ids) = processing_task(&store, "t1", 12).await;
        let runner = BatchRunner::new(Arc::new(store.clone()), DEFAULT_CONCURRENCY);

        runner
            .run_concurrent(&task_id, &lead_ids, |lead_id| async move {
                let i: u64 = lead_id.as_str().trim_start_matches("lead-").parse().unwrap();
                tokio::time::sleep(Duration::from_millis(7 * (i % 4) + 1)).await;
                if i % 3 == 0 {
                    EnrichmentResult::failed(lead_id, "x")
                } else {
                    EnrichmentResult::enriched(lead_id)
                }
            })
            .await;

        let history = store.progress_history(&task_id).await;
        // 1 回目は processing への遷移、その後リードごとに 1 回
        assert_eq!(history.len(), 1 + 12);
        for pair in history.windows(2) {
            assert!(pair[1].processed >= pair[0].processed);
        }
        for snapshot in &history {
            assert!(snapshot.processed <= snapshot.total);
            assert_eq!(snapshot.total, 12);
        }
        let last = history.last().unwrap();
        assert_eq!((last.processed, last.succeeded, last.failed), (12, 8, 4));
    }

    #[tokio::test]
    async fn sequential_runs_in_lead_order() {
        let store = InMemoryLeadStore::new();
        let (task_id, lead_ids) = processing_task(&store, "t1", 4).await;
        let runner = BatchRunner::new(Arc::new(store.clone()), DEFAULT_CONCURRENCY);

        let mut seen = Vec::new();
        let results = runner
            .run_sequential(&task_id, &lead_ids, |lead_id| {
                seen.push(lead_id.to_string());
                async move { EnrichmentResult::briefed(lead_id) }
            })
            .await;

        assert_eq!(seen, vec!["lead-0", "lead-1", "lead-2", "lead-3"]);
        assert!(results.iter().all(|r| r.briefed));
        let processed: Vec<usize> = store
            .progress_history(&task_id)
            .await
            .iter()
            .map(|p| p.processed)
            .collect();
        assert_eq!(processed, vec![0, 1, 2, 3, 4]);
    }
}
