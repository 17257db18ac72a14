//! Simulated actuator board: two fan relays, a 16x2-style LCD, and the
//! camera triggers. Stands in for the real ESP32 peripherals, logging every
//! state change.

use tracing::{info, warn};

use crate::relay::CommandMsg;

/// Visible width of the LCD line the message scrolls on.
const LCD_COLS: usize = 16;

#[derive(Debug, Default)]
pub struct Actuators {
    pub fan1: bool,
    pub fan2: bool,
    pub lcd_text: String,
    pub scans_started: u32,
    pub live_frames: u32,
}

/// Parse an "ON"/"OFF" payload (case-insensitive, trims whitespace).
fn parse_switch(value: &str) -> Result<bool, String> {
    match value.trim().to_uppercase().as_str() {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(format!("unknown switch value '{other}'")),
    }
}

impl Actuators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one command. Returns whether it was understood; either way the
    /// caller acknowledges it — the relay considers delivery done once the
    /// device has seen the command, understood or not.
    pub fn execute(&mut self, cmd: &CommandMsg) -> bool {
        match cmd.kind.as_str() {
            "fan1" => match parse_switch(&cmd.value) {
                Ok(on) => {
                    self.fan1 = on;
                    info!(id = cmd.id, on, "fan1 relay set");
                    true
                }
                Err(e) => {
                    warn!(id = cmd.id, "{e}");
                    false
                }
            },
            "fan2" => match parse_switch(&cmd.value) {
                Ok(on) => {
                    self.fan2 = on;
                    info!(id = cmd.id, on, "fan2 relay set");
                    true
                }
                Err(e) => {
                    warn!(id = cmd.id, "{e}");
                    false
                }
            },
            "msg" => {
                self.lcd_text = cmd.value.chars().take(LCD_COLS * 2).collect();
                info!(id = cmd.id, text = %self.lcd_text, "lcd updated");
                true
            }
            "capture" => {
                self.scans_started += 1;
                info!(id = cmd.id, "360 scan started");
                true
            }
            "capture_live" => {
                self.live_frames += 1;
                info!(id = cmd.id, "live frame captured");
                true
            }
            other => {
                warn!(id = cmd.id, kind = other, "unknown command kind");
                false
            }
        }
    }

    pub fn fans_on(&self) -> usize {
        self.fan1 as usize + self.fan2 as usize
    }
}

// ===========================================================================
// Tests
// ===========================================================================
