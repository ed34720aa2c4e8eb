//! Domain model (ids, tasks, leads, profiles, outcomes, records, requests).
//!
//! I/O を持たない純粋な型だけを置く。状態遷移のルール（TaskStatus,
//! aggregate_status）もここで完結させる。

pub mod errors;
pub mod ids;
pub mod lead;
pub mod outcome;
pub mod profile;
pub mod record;
pub mod request;
pub mod task;

pub use errors::{RequestError, StageError, StoreError};
pub use ids::{BusinessProfileId, Id, IdMarker, LeadId, TaskId, UserId};
pub use lead::{Briefing, EmailDraft, ExtraData, ExtractedFields, Lead, Partner, SocialMedia};
pub use outcome::{EnrichmentResult, Stage, aggregate_status, final_progress, tally};
pub use profile::{AutomationSettings, BusinessProfile};
pub use record::{TaskRecord, UsageRecord};
pub use request::{AutomationRequest, NewLeadRequest, TaskRequest, WorkItem};
pub use task::{AutomationTask, DEFAULT_MAX_RETRIES, TaskPriority, TaskProgress, TaskStatus, TaskType};
