//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。パイプライン本体（app）は
//! ここにある trait だけに依存し、実装（impls）は差し替え可能。
//!
//! # 設計原則
//! - Lead Store が source of truth（正本）
//! - Stage adapter はステートレス（コンテキストは呼び出しごとに渡す）
//! - 時刻と ID 生成もテストで固定できるよう trait にする

pub mod adapters;
pub mod clock;
pub mod id_generator;
pub mod lead_store;

pub use self::adapters::{
    BriefingGenerator, BriefingInput, EmailGenerator, EmailInput, Extractor, GeneratedEmail,
    Scraper, StageContext,
};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::lead_store::LeadStore;
