//! leadflow-core
//!
//! Automation task pipeline for lead enrichment: tasks describing one or many
//! leads are driven through scraping, extraction, briefing and email
//! generation with bounded parallelism, per-stage retry and live progress.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, lead, profile, outcome, record, request, errors）
//! - **ports**: 抽象化レイヤー（LeadStore, Scraper, Extractor, BriefingGenerator, EmailGenerator, Clock, IdGenerator）
//! - **app**: パイプライン本体（retry, executor, batch, dispatcher, worker, builder, status）
//! - **impls**: 実装（InMemoryLeadStore, HttpScraper, OpenAiClient）
//! - **config**: 設定の読み込み

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
mod testing;
