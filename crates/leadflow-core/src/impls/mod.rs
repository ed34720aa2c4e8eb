//! Impls - ports の実装
//!
//! - `memory_store`: 開発・テスト用の in-memory Lead Store
//! - `http_scraper`: reqwest + scraper による Web ページ取得
//! - `openai`: chat-completions による extraction / briefing / email

pub mod http_scraper;
pub mod memory_store;
pub mod openai;

pub use http_scraper::HttpScraper;
pub use memory_store::{InMemoryLeadStore, StoreSeed};
pub use openai::OpenAiClient;
