//! Command relay queue: an in-memory FIFO of hardware commands with a
//! three-state lifecycle (`pending` → `sent` → `ack`).
//!
//! The device cannot be pushed to, so delivery is pull-based: the browser
//! enqueues, the device polls `pending` records (which become `sent`), then
//! reports executed ids back (which become `ack`). Acknowledged records are
//! swept after a retention window. There is no `failed` state and no resend
//! timer — a record the device never acknowledges stays `sent` until an
//! administrative cleanup removes it.

use serde::Serialize;

/// Delivered-batch cap for a single device poll.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// How long acknowledged records are retained before the sweep drops them.
pub const DEFAULT_RETENTION_MS: i64 = 5 * 60 * 1000;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Fan1,
    Fan2,
    Msg,
    Capture,
    CaptureLive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Sent,
    Ack,
}

/// A single queued instruction destined for the device.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub value: String,
    pub status: CommandStatus,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Set on the transition to `ack`; drives the retention sweep.
    #[serde(rename = "ackedAt", skip_serializing_if = "Option::is_none")]
    pub acked_at: Option<i64>,
}

/// Counts by status, for dashboards and the device's debug views.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub acked: usize,
}

/// Result of an acknowledge pass: how many records newly reached `ack` and
/// how many expired records the sweep removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckOutcome {
    pub acked: usize,
    pub cleaned: usize,
}

/// Status filter for administrative cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    All,
    Pending,
    Sent,
    Acked,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Ordered command queue. Insertion order is delivery order; ids are
/// allocated from a monotonic counter and never reused, even after cleanup.
#[derive(Debug, Default)]
pub struct CommandQueue {
    records: Vec<CommandRecord>,
    next_id: u64,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new `pending` record and return it. Never fails; `value` is
    /// taken as-is (actuator validation is the caller's concern).
    pub fn enqueue(&mut self, kind: CommandKind, value: impl Into<String>, now_ms: i64) -> &CommandRecord {
        self.next_id += 1;
        self.records.push(CommandRecord {
            id: self.next_id,
            kind,
            value: value.into(),
            status: CommandStatus::Pending,
            timestamp: now_ms,
            acked_at: None,
        });
        self.records.last().unwrap()
    }

    /// Take up to `max_batch` pending records in insertion order, marking
    /// each returned record `sent` so the next poll does not redeliver it.
    ///
    /// Only the records actually returned are marked: anything beyond the
    /// cap stays `pending` and is re-offered on the next poll.
    pub fn pull_pending(&mut self, max_batch: usize) -> Vec<CommandRecord> {
        let mut batch = Vec::new();
        for rec in &mut self.records {
            if batch.len() >= max_batch {
                break;
            }
            if rec.status == CommandStatus::Pending {
                rec.status = CommandStatus::Sent;
                batch.push(rec.clone());
            }
        }
        batch
    }

    /// Mark each known id `ack` and stamp `acked_at`, then sweep expired
    /// acknowledged records. Unknown ids are ignored (duplicate report or
    /// already-swept record); re-acking an `ack` record is a no-op and does
    /// not refresh its retention stamp.
    pub fn acknowledge(&mut self, ids: &[u64], now_ms: i64, retention_ms: i64) -> AckOutcome {
        let mut acked = 0;
        for &id in ids {
            if let Some(rec) = self.records.iter_mut().find(|r| r.id == id) {
                if rec.status != CommandStatus::Ack {
                    rec.status = CommandStatus::Ack;
                    rec.acked_at = Some(now_ms);
                    acked += 1;
                }
            }
        }

        let cutoff = now_ms - retention_ms;
        let before = self.records.len();
        self.records
            .retain(|r| !(r.status == CommandStatus::Ack && r.acked_at.is_some_and(|t| t < cutoff)));

        AckOutcome {
            acked,
            cleaned: before - self.records.len(),
        }
    }

    /// Remove every record matching `scope`, regardless of lifecycle
    /// position. Returns how many were deleted.
    pub fn cleanup(&mut self, scope: CleanupScope) -> usize {
        let before = self.records.len();
        match scope {
            CleanupScope::All => self.records.clear(),
            CleanupScope::Pending => self.records.retain(|r| r.status != CommandStatus::Pending),
            CleanupScope::Sent => self.records.retain(|r| r.status != CommandStatus::Sent),
            CleanupScope::Acked => self.records.retain(|r| r.status != CommandStatus::Ack),
        }
        before - self.records.len()
    }

    /// Remove one record by id. Returns whether it existed.
    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        before > self.records.len()
    }

    pub fn stats(&self) -> QueueStats {
        let count = |s| self.records.iter().filter(|r| r.status == s).count();
        QueueStats {
            total: self.records.len(),
            pending: count(CommandStatus::Pending),
            sent: count(CommandStatus::Sent),
            acked: count(CommandStatus::Ack),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest id handed out so far (0 before the first enqueue).
    pub fn last_id(&self) -> u64 {
        self.next_id
    }
}

// ===========================================================================
// Tests
// ===========================================================================
