//! HTTP client for the relay. The device cannot hold a persistent
//! connection, so everything here is a short-lived poll: fetch pending
//! commands, report executed ids, push a telemetry summary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A command as delivered by `GET /api/pending-cmd`. The kind stays a plain
/// string on this side: an unknown kind from a newer relay must not be a
/// parse error, just an unexecutable command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandMsg {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    commands: Vec<CommandMsg>,
}

#[derive(Debug, Serialize)]
struct AckRequest<'a> {
    #[serde(rename = "commandIds")]
    command_ids: &'a [u64],
}

/// Telemetry summary for `POST /api/log-summary`. Short field names are the
/// wire contract (the ESP32 firmware this stands in for keeps JSON tiny).
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ht: Option<f64>,
    pub f1: u8,
    pub f2: u8,
    pub shk: u8,
    pub st: String,
}

#[derive(Debug, Deserialize)]
pub struct HardwareSync {
    pub f1: u8,
    pub f2: u8,
}

#[derive(Debug, Deserialize)]
struct LogSummaryResponse {
    #[serde(rename = "hardwareStateSync")]
    hardware_state_sync: HardwareSync,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RelayClient {
    http: reqwest::Client,
    base: String,
}

impl RelayClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }

    /// Pull the next batch of pending commands (the relay marks them sent).
    pub async fn fetch_pending(&self) -> Result<Vec<CommandMsg>> {
        let resp: PendingResponse = self
            .http
            .get(format!("{}/api/pending-cmd", self.base))
            .send()
            .await
            .context("pending-cmd request failed")?
            .error_for_status()?
            .json()
            .await
            .context("pending-cmd response malformed")?;
        debug!(count = resp.commands.len(), "fetched pending commands");
        Ok(resp.commands)
    }

    /// Report executed command ids. The relay rejects an empty list, so an
    /// empty slice skips the call entirely.
    pub async fn acknowledge(&self, ids: &[u64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.http
            .post(format!("{}/api/cmd-ack", self.base))
            .json(&AckRequest { command_ids: ids })
            .send()
            .await
            .context("cmd-ack request failed")?
            .error_for_status()?;
        debug!(count = ids.len(), "acknowledged commands");
        Ok(())
    }

    /// Push an authoritative telemetry snapshot; returns the relay's synced
    /// view of the actuators.
    pub async fn push_telemetry(&self, summary: &TelemetrySummary) -> Result<HardwareSync> {
        let resp: LogSummaryResponse = self
            .http
            .post(format!("{}/api/log-summary", self.base))
            .json(summary)
            .send()
            .await
            .context("log-summary request failed")?
            .error_for_status()?
            .json()
            .await
            .context("log-summary response malformed")?;
        Ok(resp.hardware_state_sync)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
