//! Session-scoped identity map and write buffer.

use crate::model::member::Member;
use crate::model::team::Team;
use crate::model::{EntityId, EntityKind, RecordKey};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Update,
    Delete,
}

/// A write applied at the next flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingWrite {
    pub key: RecordKey,
    pub op: WriteOp,
}

/// Entities tracked by one session, at most one copy per identity.
///
/// Tracked members always hold an unresolved team reference.
#[derive(Debug, Default)]
pub struct PersistenceContext {
    pub(crate) members: HashMap<EntityId, Member>,
    pub(crate) teams: HashMap<EntityId, Team>,
    pending: Vec<PendingWrite>,
}

impl PersistenceContext {
    pub fn tracked_count(&self) -> usize {
        self.members.len() + self.teams.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_pending_delete(&self, key: RecordKey) -> bool {
        self.pending
            .iter()
            .any(|write| write.key == key && write.op == WriteOp::Delete)
    }

    /// Buffers an update once per record.
    pub(crate) fn push_update(&mut self, key: RecordKey) {
        if !self.pending.iter().any(|write| write.key == key) {
            self.pending.push(PendingWrite {
                key,
                op: WriteOp::Update,
            });
        }
    }

    /// Buffers a delete, superseding any buffered update of the record.
    pub(crate) fn push_delete(&mut self, key: RecordKey) {
        self.pending.retain(|write| write.key != key);
        self.pending.push(PendingWrite {
            key,
            op: WriteOp::Delete,
        });
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingWrite> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn restore_pending(&mut self, writes: Vec<PendingWrite>) {
        self.pending = writes;
    }

    pub(crate) fn evict(&mut self, key: RecordKey) {
        match key.kind {
            EntityKind::Member => {
                self.members.remove(&key.id);
            }
            EntityKind::Team => {
                self.teams.remove(&key.id);
            }
        }
    }

    /// Detaches everything; returns the number of discarded writes.
    pub(crate) fn clear(&mut self) -> usize {
        self.members.clear();
        self.teams.clear();
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

/// Counters for the statements a session has issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// SQL statements executed, flushes included.
    pub statements: u64,
    /// Single-row reads by id that missed the session cache.
    pub entity_fetches: u64,
    /// Flushes that applied at least one write.
    pub flushes: u64,
}
