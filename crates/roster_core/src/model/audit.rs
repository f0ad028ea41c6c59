//! Audit metadata and the collaborators that supply it.
//!
//! # Invariants
//! - `created_*` values are written once and never change afterwards.
//! - `updated_at` never moves backwards and is always `>= created_at`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Creation and last-modification metadata of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub created_by: String,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    pub updated_by: String,
}

impl Audit {
    pub(crate) fn created(stamp: &AuditStamp) -> Self {
        Self {
            created_at: stamp.at_ms,
            created_by: stamp.actor.clone(),
            updated_at: stamp.at_ms,
            updated_by: stamp.actor.clone(),
        }
    }

    pub(crate) fn touch(&mut self, stamp: &AuditStamp) {
        self.updated_at = stamp.at_ms.max(self.updated_at);
        self.updated_by = stamp.actor.clone();
    }
}

/// Time and actor captured once per persist or flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub at_ms: i64,
    pub actor: String,
}

/// Source of audit timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock in Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

/// Supplies the actor recorded in `created_by` / `updated_by`.
pub trait AuditorAware: Send + Sync {
    fn current_auditor(&self) -> String;
}

/// Auditor that always reports the same actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAuditor(String);

impl StaticAuditor {
    pub fn new(actor: impl Into<String>) -> Self {
        Self(actor.into())
    }
}

impl Default for StaticAuditor {
    fn default() -> Self {
        Self::new("system")
    }
}

impl AuditorAware for StaticAuditor {
    fn current_auditor(&self) -> String {
        self.0.clone()
    }
}

impl<F> AuditorAware for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_auditor(&self) -> String {
        self()
    }
}
