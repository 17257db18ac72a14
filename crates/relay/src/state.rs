use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::RelayConfig;
use crate::queue::{CommandQueue, QueueStats};

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<RelayState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Last-known authoritative actuator state. Optimistically overwritten on
/// fan enqueue, authoritatively overwritten by device telemetry — the
/// device report always wins on conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HardwareState {
    pub f1: u8,
    pub f2: u8,
}

/// One LCD message, kept in a most-recent-first ring for history display.
#[derive(Debug, Clone, Serialize)]
pub struct LcdMessage {
    pub text: String,
    pub timestamp: String,
}

/// Telemetry snapshot the device pushes with `/api/log-summary`. Every
/// field is optional; absent actuator fields leave hardware state alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetrySummary {
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub s: Option<f64>,
    pub ht: Option<f64>,
    pub f1: Option<u8>,
    pub f2: Option<u8>,
    pub shk: Option<u8>,
    pub st: Option<String>,
}

/// One entry in the telemetry history ring, with the queue status as it
/// stood when the entry was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub s: Option<f64>,
    pub ht: Option<f64>,
    pub f1: Option<u8>,
    pub f2: Option<u8>,
    pub shk: Option<u8>,
    pub st: Option<String>,
    pub queue: QueueStats,
}

// ---------------------------------------------------------------------------
// Merged snapshot (what GET /api/data returns)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct DataSnapshot {
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub s: Option<f64>,
    pub ht: Option<f64>,
    pub shk: Option<u8>,
    pub st: Option<String>,
    pub f1: u8,
    pub f2: u8,
    pub messages: Vec<LcdMessage>,
    #[serde(rename = "newMsg")]
    pub new_msg: Option<LcdMessage>,
    #[serde(rename = "frameTimestamp")]
    pub frame_timestamp: Option<i64>,
    #[serde(rename = "frameSize")]
    pub frame_size: usize,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// Relay state
// ---------------------------------------------------------------------------

/// All process state. Single-writer: every mutation happens inside one
/// write-guard turn, so the compound queue operations (read-then-mark,
/// find-then-mutate) never interleave.
pub struct RelayState {
    pub started_at: Instant,
    pub queue: CommandQueue,
    pub hardware: HardwareState,
    messages: VecDeque<LcdMessage>,
    last_new: Option<LcdMessage>,
    history: VecDeque<HistoryEntry>,
    frame_at: Option<i64>,
    frame_size: usize,
    message_ring: usize,
    history_cap: usize,
}

impl RelayState {
    pub fn new(cfg: &RelayConfig) -> Self {
        Self {
            started_at: Instant::now(),
            queue: CommandQueue::new(),
            hardware: HardwareState::default(),
            messages: VecDeque::with_capacity(cfg.message_ring),
            last_new: None,
            history: VecDeque::with_capacity(64),
            frame_at: None,
            frame_size: 0,
            message_ring: cfg.message_ring,
            history_cap: cfg.history_cap,
        }
    }

    /// Push an LCD message to the front of the ring, evicting the oldest
    /// beyond capacity, and remember it as the newest for device pickup.
    pub fn push_message(&mut self, text: &str) {
        let msg = LcdMessage {
            text: text.to_string(),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
        };
        self.messages.push_front(msg.clone());
        if self.messages.len() > self.message_ring {
            self.messages.pop_back();
        }
        self.last_new = Some(msg);
    }

    /// Apply a device telemetry push: present actuator fields overwrite
    /// hardware state authoritatively, and a history entry is appended
    /// (oldest evicted beyond the cap). Returns the recorded entry.
    pub fn record_telemetry(&mut self, summary: TelemetrySummary) -> HistoryEntry {
        if let Some(f1) = summary.f1 {
            self.hardware.f1 = f1;
        }
        if let Some(f2) = summary.f2 {
            self.hardware.f2 = f2;
        }

        let entry = HistoryEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            t: summary.t,
            h: summary.h,
            s: summary.s,
            ht: summary.ht,
            f1: summary.f1,
            f2: summary.f2,
            shk: summary.shk,
            st: summary.st,
            queue: self.queue.stats(),
        };
        self.history.push_back(entry.clone());
        if self.history.len() > self.history_cap {
            self.history.pop_front();
        }
        entry
    }

    /// Record live-frame metadata (the relay never stores the bytes).
    pub fn record_frame(&mut self, size: usize, now_ms: i64) {
        self.frame_at = Some(now_ms);
        self.frame_size = size;
    }

    pub fn history_tail(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn messages_len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear_messages(&mut self) -> usize {
        let n = self.messages.len();
        self.messages.clear();
        self.last_new = None;
        n
    }

    pub fn clear_history(&mut self) -> usize {
        let n = self.history.len();
        self.history.clear();
        n
    }

    /// Build the merged snapshot: latest telemetry fields, authoritative
    /// hardware state, message ring, frame metadata.
    pub fn data_snapshot(&self) -> DataSnapshot {
        let latest = self.history.back();
        DataSnapshot {
            t: latest.and_then(|e| e.t),
            h: latest.and_then(|e| e.h),
            s: latest.and_then(|e| e.s),
            ht: latest.and_then(|e| e.ht),
            shk: latest.and_then(|e| e.shk),
            st: latest.and_then(|e| e.st.clone()),
            f1: self.hardware.f1,
            f2: self.hardware.f2,
            messages: self.messages.iter().cloned().collect(),
            new_msg: self.last_new.clone(),
            frame_timestamp: self.frame_at,
            frame_size: self.frame_size,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::CommandKind;

    fn state() -> RelayState {
        RelayState::new(&RelayConfig::default())
    }

    // -- message ring --------------------------------------------------------

    #[test]
    fn message_ring_is_newest_first() {
        let mut st = state();
        st.push_message("first");
        st.push_message("second");
        let snap = st.data_snapshot();
        assert_eq!(snap.messages[0].text, "second");
        assert_eq!(snap.messages[1].text, "first");
    }

    #[test]
    fn message_ring_bounded_at_capacity() {
        let mut st = state();
        for i in 0..7 {
            st.push_message(&format!("m{i}"));
        }
        assert_eq!(st.messages_len(), 5);
        let snap = st.data_snapshot();
        // Newest kept, oldest two evicted.
        assert_eq!(snap.messages[0].text, "m6");
        assert_eq!(snap.messages[4].text, "m2");
    }

    #[test]
    fn push_message_tracks_newest() {
        let mut st = state();
        st.push_message("Merhaba");
        assert_eq!(st.data_snapshot().new_msg.unwrap().text, "Merhaba");
    }

    #[test]
    fn clear_messages_resets_ring_and_newest() {
        let mut st = state();
        st.push_message("a");
        st.push_message("b");
        assert_eq!(st.clear_messages(), 2);
        let snap = st.data_snapshot();
        assert!(snap.messages.is_empty());
        assert!(snap.new_msg.is_none());
    }

    // -- telemetry -----------------------------------------------------------

    #[test]
    fn record_telemetry_overwrites_hardware_state() {
        let mut st = state();
        st.hardware.f1 = 1; // optimistic guess
        st.record_telemetry(TelemetrySummary {
            f1: Some(0),
            f2: Some(1),
            ..TelemetrySummary::default()
        });
        assert_eq!(st.hardware, HardwareState { f1: 0, f2: 1 });
    }

    #[test]
    fn record_telemetry_absent_fields_leave_hardware_alone() {
        let mut st = state();
        st.hardware = HardwareState { f1: 1, f2: 0 };
        st.record_telemetry(TelemetrySummary {
            t: Some(23.5),
            ..TelemetrySummary::default()
        });
        assert_eq!(st.hardware, HardwareState { f1: 1, f2: 0 });
    }

    #[test]
    fn history_ring_evicts_oldest() {
        let cfg = RelayConfig {
            history_cap: 3,
            ..RelayConfig::default()
        };
        let mut st = RelayState::new(&cfg);
        for i in 0..5 {
            st.record_telemetry(TelemetrySummary {
                t: Some(i as f64),
                ..TelemetrySummary::default()
            });
        }
        assert_eq!(st.history_len(), 3);
        let tail = st.history_tail(100);
        assert_eq!(tail[0].t, Some(2.0));
        assert_eq!(tail[2].t, Some(4.0));
    }

    #[test]
    fn history_tail_caps_at_n() {
        let mut st = state();
        for _ in 0..10 {
            st.record_telemetry(TelemetrySummary::default());
        }
        assert_eq!(st.history_tail(4).len(), 4);
    }

    #[test]
    fn history_entry_snapshots_queue_stats() {
        let mut st = state();
        st.queue.enqueue(CommandKind::Fan1, "ON", 0);
        let entry = st.record_telemetry(TelemetrySummary::default());
        assert_eq!(entry.queue.pending, 1);
        assert_eq!(entry.queue.total, 1);
    }

    // -- snapshot ------------------------------------------------------------

    #[test]
    fn data_snapshot_merges_latest_telemetry_and_hardware() {
        let mut st = state();
        st.record_telemetry(TelemetrySummary {
            t: Some(24.0),
            h: Some(55.0),
            f1: Some(1),
            ..TelemetrySummary::default()
        });
        let snap = st.data_snapshot();
        assert_eq!(snap.t, Some(24.0));
        assert_eq!(snap.h, Some(55.0));
        assert_eq!(snap.f1, 1);
    }

    #[test]
    fn data_snapshot_empty_history_gives_nulls() {
        let snap = state().data_snapshot();
        assert!(snap.t.is_none());
        assert_eq!(snap.f1, 0);
        assert!(snap.messages.is_empty());
    }

    #[test]
    fn record_frame_updates_metadata() {
        let mut st = state();
        st.record_frame(4096, 1_700_000_000_000);
        let snap = st.data_snapshot();
        assert_eq!(snap.frame_timestamp, Some(1_700_000_000_000));
        assert_eq!(snap.frame_size, 4096);
    }
}
