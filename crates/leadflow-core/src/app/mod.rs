//! App - パイプライン本体
//!
//! - retry: 固定間隔リトライ
//! - executor: 1 lead × 1 stage の実行
//! - batch: 並列度制御と進捗の書き込み
//! - dispatcher: タスクの状態機械
//! - worker: 投入キューとワーカー
//! - builder: ワイヤリング

pub mod batch;
pub mod builder;
pub mod content;
pub mod dispatcher;
pub mod executor;
pub mod retry;
pub mod status;
pub mod worker;

pub use batch::{BatchRunner, DEFAULT_CONCURRENCY};
pub use builder::{BuildError, Pipeline, PipelineBuilder};
pub use content::synthesize_profile;
pub use dispatcher::{NO_LEADS_ERROR, TaskDispatcher};
pub use executor::{StageAdapters, StageExecutor};
pub use retry::{RetryPolicy, retry};
pub use status::RunSummary;
pub use worker::{SubmitError, TaskQueue};
