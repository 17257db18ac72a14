//! Relay API surface the controller talks through. The trait exists so the
//! controller's optimistic/rollback logic can be driven by a scripted fake
//! in tests; `HttpRelay` is the real reqwest-backed implementation.

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The two fan actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    Fan1,
    Fan2,
}

impl Fan {
    /// Query-string key on `/api/cmd`.
    pub fn param(self) -> &'static str {
        match self {
            Fan::Fan1 => "fan1",
            Fan::Fan2 => "fan2",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct HardwareState {
    pub f1: u8,
    pub f2: u8,
}

/// Response to enqueue calls on `/api/cmd`.
#[derive(Debug, Clone, Deserialize)]
pub struct CmdResponse {
    pub success: bool,
    #[serde(rename = "queueLength")]
    pub queue_length: usize,
    #[serde(rename = "lastCommandId")]
    pub last_command_id: u64,
    #[serde(rename = "hardwareState")]
    pub hardware_state: Option<HardwareState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LcdMessage {
    pub text: String,
    pub timestamp: String,
}

/// The slice of `GET /api/data` the console displays.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataSnapshot {
    pub t: Option<f64>,
    pub h: Option<f64>,
    pub s: Option<f64>,
    pub f1: u8,
    pub f2: u8,
    #[serde(default)]
    pub messages: Vec<LcdMessage>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub acked: usize,
    #[serde(rename = "lastCommandId")]
    pub last_command_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureResponse {
    #[serde(rename = "commandId")]
    command_id: u64,
}

// ---------------------------------------------------------------------------
// API trait
// ---------------------------------------------------------------------------

#[allow(async_fn_in_trait)]
pub trait RelayApi {
    async fn send_fan(&self, fan: Fan, on: bool) -> Result<CmdResponse>;
    async fn send_message(&self, text: &str) -> Result<CmdResponse>;
    async fn trigger_capture(&self) -> Result<u64>;
    async fn trigger_capture_live(&self) -> Result<u64>;
    async fn fetch_data(&self) -> Result<DataSnapshot>;
    async fn queue_status(&self) -> Result<QueueStatus>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpRelay {
    http: reqwest::Client,
    base: String,
}

impl HttpRelay {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

impl RelayApi for HttpRelay {
    async fn send_fan(&self, fan: Fan, on: bool) -> Result<CmdResponse> {
        let value = if on { "ON" } else { "OFF" };
        self.http
            .get(format!("{}/api/cmd", self.base))
            .query(&[(fan.param(), value)])
            .send()
            .await
            .context("cmd request failed")?
            .error_for_status()?
            .json()
            .await
            .context("cmd response malformed")
    }

    async fn send_message(&self, text: &str) -> Result<CmdResponse> {
        self.http
            .get(format!("{}/api/cmd", self.base))
            .query(&[("msg", text)])
            .send()
            .await
            .context("cmd request failed")?
            .error_for_status()?
            .json()
            .await
            .context("cmd response malformed")
    }

    async fn trigger_capture(&self) -> Result<u64> {
        let resp: CaptureResponse = self
            .http
            .get(format!("{}/api/capture", self.base))
            .send()
            .await
            .context("capture request failed")?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.command_id)
    }

    async fn trigger_capture_live(&self) -> Result<u64> {
        let resp: CaptureResponse = self
            .http
            .get(format!("{}/api/capture-live", self.base))
            .send()
            .await
            .context("capture-live request failed")?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.command_id)
    }

    async fn fetch_data(&self) -> Result<DataSnapshot> {
        self.http
            .get(format!("{}/api/data", self.base))
            .send()
            .await
            .context("data request failed")?
            .error_for_status()?
            .json()
            .await
            .context("data response malformed")
    }

    async fn queue_status(&self) -> Result<QueueStatus> {
        self.http
            .get(format!("{}/api/queue-status", self.base))
            .send()
            .await
            .context("queue-status request failed")?
            .error_for_status()?
            .json()
            .await
            .context("queue-status response malformed")
    }
}

// ===========================================================================
// Tests
// ===========================================================================
