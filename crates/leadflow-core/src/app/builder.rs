//! PipelineBuilder - パイプラインの構築とワイヤリング
//!
//! store / adapters / clock / id generator を受け取り、executor・batch runner・
//! dispatcher をつないで [`Pipeline`] を返す。
//!
//! # Fail-fast 設計
//! - store が無い、並列度が 0、HTTP client が作れない → `build()` / `from_settings()` がエラー
//! - OpenAI の API key が無いのはエラーにしない（該当ステージが Unavailable になるだけ）

use std::sync::Arc;

use tracing::{info, warn};

use super::batch::{BatchRunner, DEFAULT_CONCURRENCY};
use super::dispatcher::TaskDispatcher;
use super::executor::{StageAdapters, StageExecutor};
use super::retry::RetryPolicy;
use super::worker::TaskQueue;
use crate::config::Settings;
use crate::impls::{HttpScraper, OpenAiClient};
use crate::ports::{
    BriefingGenerator, Clock, EmailGenerator, Extractor, IdGenerator, LeadStore, Scraper,
    SystemClock, UlidGenerator,
};

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no lead store configured")]
    MissingStore,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

/// Wiring for a [`Pipeline`].
///
/// ```ignore
/// let pipeline = PipelineBuilder::from_settings(&settings)?
///     .store(Arc::new(store))
///     .build()?;
/// let queue = pipeline.start_queue(64, 2);
/// ```
pub struct PipelineBuilder {
    store: Option<Arc<dyn LeadStore>>,
    adapters: StageAdapters,
    concurrency: usize,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            adapters: StageAdapters::default(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            ids: None,
        }
    }

    /// Builder preloaded with the HTTP adapters and pipeline knobs from
    /// `settings`. Without an OpenAI key only scraping is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, BuildError> {
        let scraper = HttpScraper::new(&settings.scraper, settings.timeouts.scrape())
            .map_err(|e| BuildError::HttpClient(e.to_string()))?;
        let mut builder = Self::new()
            .scraper(Arc::new(scraper))
            .concurrency(settings.pipeline.concurrency)
            .retry(RetryPolicy::new(
                settings.pipeline.max_retries,
                settings.pipeline.retry_delay(),
            ));

        match settings.openai.api_key() {
            Some(key) => {
                let client = Arc::new(
                    OpenAiClient::new(&settings.openai, key, settings.timeouts.clone())
                        .map_err(|e| BuildError::HttpClient(e.to_string()))?,
                );
                builder = builder
                    .extractor(client.clone())
                    .briefing_generator(client.clone())
                    .email_generator(client);
            }
            None => warn!("no OpenAI API key, extraction, briefing and email generation disabled"),
        }
        Ok(builder)
    }

    pub fn store(mut self, store: Arc<dyn LeadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.adapters.scraper = Some(scraper);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.adapters.extractor = Some(extractor);
        self
    }

    pub fn briefing_generator(mut self, generator: Arc<dyn BriefingGenerator>) -> Self {
        self.adapters.briefing = Some(generator);
        self
    }

    pub fn email_generator(mut self, generator: Arc<dyn EmailGenerator>) -> Self {
        self.adapters.email = Some(generator);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Delay and default budget; each task's `max_retries` still overrides
    /// the budget when it runs.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to ULIDs stamped with the builder's clock.
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        if self.concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));

        let executor = StageExecutor::new(Arc::clone(&store), self.adapters, Arc::clone(&self.clock));
        let batch = BatchRunner::new(Arc::clone(&store), self.concurrency);
        let dispatcher = TaskDispatcher::new(
            store,
            Arc::new(executor),
            batch,
            self.retry,
            self.clock,
            Arc::clone(&ids),
        );
        info!(
            concurrency = self.concurrency,
            max_retries = self.retry.max_retries,
            retry_delay_secs = self.retry.delay.as_secs(),
            "pipeline built"
        );

        Ok(Pipeline {
            dispatcher: Arc::new(dispatcher),
            ids,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired pipeline: the dispatcher plus the id generator requests use.
pub struct Pipeline {
    dispatcher: Arc<TaskDispatcher>,
    ids: Arc<dyn IdGenerator>,
}

impl Pipeline {
    pub fn dispatcher(&self) -> &Arc<TaskDispatcher> {
        &self.dispatcher
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Spawn the submission queue and its workers on the current runtime.
    pub fn start_queue(&self, capacity: usize, workers: usize) -> TaskQueue {
        TaskQueue::start(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ids),
            capacity,
            workers,
        )
    }
}
