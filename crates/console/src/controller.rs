//! Optimistic control panel. User actions mutate the displayed state
//! immediately, then the relay round-trip confirms or rolls back:
//!
//! 1. capture the currently displayed value
//! 2. apply the negation optimistically, mark the control in-flight
//! 3. call the relay
//! 4. success: the response's authoritative state overwrites the guess
//! 5. failure: roll back to the captured value and raise a blocking alert
//! 6. either way, clear the in-flight flag
//!
//! Message/scan actions share the shape minus the rollback value (there is
//! no prior displayed state to revert). Any divergence left over is bounded
//! by the next `reconcile` from a `/api/data` poll.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::api::{DataSnapshot, Fan, RelayApi};

/// Transient status lines fade after this long.
const STATUS_TTL: Duration = Duration::from_secs(5);

pub struct Panel {
    f1: u8,
    f2: u8,
    f1_busy: bool,
    f2_busy: bool,
    status: Option<(String, Instant)>,
    alert: Option<String>,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel {
    pub fn new() -> Self {
        Self {
            f1: 0,
            f2: 0,
            f1_busy: false,
            f2_busy: false,
            status: None,
            alert: None,
        }
    }

    pub fn displayed(&self, fan: Fan) -> u8 {
        match fan {
            Fan::Fan1 => self.f1,
            Fan::Fan2 => self.f2,
        }
    }

    fn set_displayed(&mut self, fan: Fan, value: u8) {
        match fan {
            Fan::Fan1 => self.f1 = value,
            Fan::Fan2 => self.f2 = value,
        }
    }

    pub fn in_flight(&self, fan: Fan) -> bool {
        match fan {
            Fan::Fan1 => self.f1_busy,
            Fan::Fan2 => self.f2_busy,
        }
    }

    fn set_in_flight(&mut self, fan: Fan, busy: bool) {
        match fan {
            Fan::Fan1 => self.f1_busy = busy,
            Fan::Fan2 => self.f2_busy = busy,
        }
    }

    fn set_status(&mut self, line: impl Into<String>) {
        self.status = Some((line.into(), Instant::now()));
    }

    /// Current transient status line, if it has not faded yet.
    pub fn status_line(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TTL)
            .map(|(line, _)| line.as_str())
    }

    /// Take the pending blocking alert, if any. The caller must surface it
    /// to the operator before processing further input.
    pub fn take_alert(&mut self) -> Option<String> {
        self.alert.take()
    }

    // -- actions -------------------------------------------------------------

    /// Toggle a fan with optimistic display and rollback. Returns false if
    /// the control is still in flight from a previous toggle (no second
    /// optimistic update may race the rollback of the first).
    pub async fn toggle_fan<A: RelayApi>(&mut self, api: &A, fan: Fan) -> bool {
        if self.in_flight(fan) {
            warn!(fan = fan.param(), "toggle ignored, command in flight");
            return false;
        }
        self.set_in_flight(fan, true);

        let old_value = self.displayed(fan);
        let new_value = if old_value == 1 { 0 } else { 1 };
        self.set_displayed(fan, new_value);
        self.set_status(format!("sending {}...", fan.param()));

        let turned_on = new_value == 1;
        match api.send_fan(fan, turned_on).await {
            Ok(resp) => {
                // Authoritative state wins, even over our own guess.
                if let Some(hw) = resp.hardware_state {
                    self.f1 = hw.f1;
                    self.f2 = hw.f2;
                }
                self.set_status(format!(
                    "{} {} (command #{})",
                    fan.param(),
                    if turned_on { "ON" } else { "OFF" },
                    resp.last_command_id
                ));
                info!(fan = fan.param(), on = turned_on, id = resp.last_command_id, "toggle confirmed");
            }
            Err(e) => {
                self.set_displayed(fan, old_value);
                self.set_status(format!("{} failed - {e:#}", fan.param()));
                self.alert = Some(format!("command not delivered: {e:#}"));
                warn!(fan = fan.param(), "toggle rolled back: {e:#}");
            }
        }

        self.set_in_flight(fan, false);
        true
    }

    /// Send an LCD message. Fire-and-forget: status only, nothing to roll
    /// back.
    pub async fn send_message<A: RelayApi>(&mut self, api: &A, text: &str) {
        self.set_status("sending message...");
        match api.send_message(text).await {
            Ok(resp) => {
                self.set_status(format!("message queued (command #{})", resp.last_command_id));
            }
            Err(e) => {
                self.set_status(format!("message failed - {e:#}"));
                self.alert = Some(format!("message not delivered: {e:#}"));
            }
        }
    }

    /// Trigger a 360° scan.
    pub async fn trigger_scan<A: RelayApi>(&mut self, api: &A) {
        self.set_status("requesting 360 scan...");
        match api.trigger_capture().await {
            Ok(id) => self.set_status(format!("scan queued (command #{id})")),
            Err(e) => {
                self.set_status(format!("scan failed - {e:#}"));
                self.alert = Some(format!("scan not delivered: {e:#}"));
            }
        }
    }

    /// Request a single live frame.
    pub async fn trigger_live_frame<A: RelayApi>(&mut self, api: &A) {
        self.set_status("requesting live frame...");
        match api.trigger_capture_live().await {
            Ok(id) => self.set_status(format!("live frame queued (command #{id})")),
            Err(e) => {
                self.set_status(format!("live frame failed - {e:#}"));
                self.alert = Some(format!("live frame not delivered: {e:#}"));
            }
        }
    }

    /// Overwrite displayed state from a telemetry poll. This is what bounds
    /// any optimistic divergence to one polling interval.
    pub fn reconcile(&mut self, data: &DataSnapshot) {
        self.f1 = data.f1;
        self.f2 = data.f2;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CmdResponse, HardwareState, QueueStatus};
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Scripted relay double: pops one outcome per fan call.
    struct FakeRelay {
        outcomes: RefCell<VecDeque<Result<CmdResponse>>>,
    }

    impl FakeRelay {
        fn scripted(outcomes: Vec<Result<CmdResponse>>) -> Self {
            Self {
                outcomes: RefCell::new(outcomes.into()),
            }
        }

        fn ok(hardware_state: Option<HardwareState>) -> Result<CmdResponse> {
            Ok(CmdResponse {
                success: true,
                queue_length: 1,
                last_command_id: 1,
                hardware_state,
            })
        }

        fn network_error() -> Result<CmdResponse> {
            Err(anyhow!("connection refused"))
        }

        fn next(&self) -> Result<CmdResponse> {
            self.outcomes
                .borrow_mut()
                .pop_front()
                .expect("no scripted outcome left")
        }
    }

    impl RelayApi for FakeRelay {
        async fn send_fan(&self, _fan: Fan, _on: bool) -> Result<CmdResponse> {
            self.next()
        }
        async fn send_message(&self, _text: &str) -> Result<CmdResponse> {
            self.next()
        }
        async fn trigger_capture(&self) -> Result<u64> {
            self.next().map(|r| r.last_command_id)
        }
        async fn trigger_capture_live(&self) -> Result<u64> {
            self.next().map(|r| r.last_command_id)
        }
        async fn fetch_data(&self) -> Result<DataSnapshot> {
            Ok(DataSnapshot::default())
        }
        async fn queue_status(&self) -> Result<QueueStatus> {
            Ok(QueueStatus {
                total: 0,
                pending: 0,
                sent: 0,
                acked: 0,
                last_command_id: 0,
            })
        }
    }

    // -- optimistic toggle ---------------------------------------------------

    #[tokio::test]
    async fn toggle_confirms_with_authoritative_state() {
        let api = FakeRelay::scripted(vec![FakeRelay::ok(Some(HardwareState { f1: 1, f2: 0 }))]);
        let mut panel = Panel::new();

        assert!(panel.toggle_fan(&api, Fan::Fan1).await);
        assert_eq!(panel.displayed(Fan::Fan1), 1);
        assert!(!panel.in_flight(Fan::Fan1));
        assert!(panel.take_alert().is_none());
        assert!(panel.status_line().is_some());
    }

    #[tokio::test]
    async fn authoritative_state_overrides_optimistic_guess() {
        // Console guesses ON, but the relay says the fan is actually OFF.
        let api = FakeRelay::scripted(vec![FakeRelay::ok(Some(HardwareState { f1: 0, f2: 0 }))]);
        let mut panel = Panel::new();

        panel.toggle_fan(&api, Fan::Fan1).await;
        assert_eq!(panel.displayed(Fan::Fan1), 0);
    }

    #[tokio::test]
    async fn response_without_state_keeps_optimistic_value() {
        let api = FakeRelay::scripted(vec![FakeRelay::ok(None)]);
        let mut panel = Panel::new();

        panel.toggle_fan(&api, Fan::Fan2).await;
        assert_eq!(panel.displayed(Fan::Fan2), 1);
    }

    #[tokio::test]
    async fn network_error_rolls_back_and_alerts() {
        let api = FakeRelay::scripted(vec![FakeRelay::network_error()]);
        let mut panel = Panel::new();

        panel.toggle_fan(&api, Fan::Fan2).await;
        // Fan was OFF before the optimistic ON; the failure restores it.
        assert_eq!(panel.displayed(Fan::Fan2), 0);
        assert!(!panel.in_flight(Fan::Fan2));

        let alert = panel.take_alert().expect("failure must raise an alert");
        assert!(alert.contains("connection refused"));
        assert!(panel.take_alert().is_none(), "alert is taken once");
    }

    #[tokio::test]
    async fn rollback_restores_on_state_too() {
        let api = FakeRelay::scripted(vec![
            FakeRelay::ok(Some(HardwareState { f1: 1, f2: 0 })),
            FakeRelay::network_error(),
        ]);
        let mut panel = Panel::new();

        panel.toggle_fan(&api, Fan::Fan1).await; // ON confirmed
        panel.toggle_fan(&api, Fan::Fan1).await; // OFF attempt fails
        assert_eq!(panel.displayed(Fan::Fan1), 1, "rollback must restore ON");
    }

    #[tokio::test]
    async fn toggle_refused_while_in_flight() {
        let api = FakeRelay::scripted(vec![]);
        let mut panel = Panel::new();
        panel.set_in_flight(Fan::Fan1, true);

        assert!(!panel.toggle_fan(&api, Fan::Fan1).await);
        assert_eq!(panel.displayed(Fan::Fan1), 0, "no optimistic write happened");
    }

    #[tokio::test]
    async fn fans_track_independent_flags() {
        let api = FakeRelay::scripted(vec![FakeRelay::ok(None)]);
        let mut panel = Panel::new();
        panel.set_in_flight(Fan::Fan1, true);

        // Fan2 is not blocked by fan1's in-flight command.
        assert!(panel.toggle_fan(&api, Fan::Fan2).await);
    }

    // -- fire-and-forget actions ---------------------------------------------

    #[tokio::test]
    async fn message_failure_alerts_without_rollback() {
        let api = FakeRelay::scripted(vec![FakeRelay::network_error()]);
        let mut panel = Panel::new();
        panel.reconcile(&DataSnapshot {
            f1: 1,
            ..DataSnapshot::default()
        });

        panel.send_message(&api, "hello").await;
        assert!(panel.take_alert().is_some());
        // Displayed fan state untouched by a message failure.
        assert_eq!(panel.displayed(Fan::Fan1), 1);
    }

    #[tokio::test]
    async fn scan_success_sets_status_only() {
        let api = FakeRelay::scripted(vec![FakeRelay::ok(None)]);
        let mut panel = Panel::new();

        panel.trigger_scan(&api).await;
        assert!(panel.status_line().unwrap().contains("scan queued"));
        assert!(panel.take_alert().is_none());
    }

    // -- reconcile -----------------------------------------------------------

    #[tokio::test]
    async fn reconcile_overwrites_displayed_state() {
        let mut panel = Panel::new();
        panel.reconcile(&DataSnapshot {
            f1: 1,
            f2: 1,
            ..DataSnapshot::default()
        });
        assert_eq!(panel.displayed(Fan::Fan1), 1);
        assert_eq!(panel.displayed(Fan::Fan2), 1);
    }
}
