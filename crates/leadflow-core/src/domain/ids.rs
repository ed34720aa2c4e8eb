//! Domain identifiers (strongly-typed IDs).
//!
//! Every identifier that crosses the store boundary is an opaque string: task
//! ids may be supplied by the caller (webhook payloads carry their own), lead
//! and user ids come from the relational store. `Id<T>` keeps them apart at
//! compile time while sharing one implementation.
//!
//! ## Phantom Type pattern
//! `T` is a zero-sized marker (`PhantomData`); `TaskId` and `LeadId` are
//! different types even though both wrap a `String`.
//!
//! Generated ids use a ULID with a marker prefix (`task-01J...`), so they sort
//! by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each id kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Prefix used for generated ids (e.g. "task-").
    fn prefix() -> &'static str;
}

/// Generic string id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Wrap an existing id (caller-supplied or read from the store).
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// Build a prefixed id from a ULID.
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self::new(format!("{}{}", T::prefix(), ulid))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl<T: IdMarker> Default for Id<T> {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ========================================
// Marker types
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lead {}

impl IdMarker for Lead {
    fn prefix() -> &'static str {
        "lead-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn prefix() -> &'static str {
        "user-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BusinessProfile {}

impl IdMarker for BusinessProfile {
    fn prefix() -> &'static str {
        "profile-"
    }
}

pub type TaskId = Id<Task>;
pub type LeadId = Id<Lead>;
pub type UserId = Id<User>;
pub type BusinessProfileId = Id<BusinessProfile>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_their_prefix() {
        let task_id = TaskId::from_ulid(Ulid::new());
        let lead_id = LeadId::from_ulid(Ulid::new());

        assert!(task_id.as_str().starts_with("task-"));
        assert!(lead_id.as_str().starts_with("lead-"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = LeadId::new("9b1c2f");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("9b1c2f"));

        let back: LeadId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(UserId::new("   ").is_blank());
        assert!(!UserId::new("u1").is_blank());
    }
}
