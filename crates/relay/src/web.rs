//! HTTP surface of the relay. Two consumers with different cadences poll
//! this router: the operator console (enqueue + snapshot reads) and the
//! device (`/api/pending-cmd`, `/api/cmd-ack`, `/api/log-summary` — the
//! only routes that move authoritative state).

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::RelayConfig;
use crate::queue::{CleanupScope, CommandKind};
use crate::state::{SharedState, TelemetrySummary};

// ---------------------------------------------------------------------------
// Router state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub shared: SharedState,
    pub cfg: Arc<RelayConfig>,
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CmdParams {
    fan1: Option<String>,
    fan2: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AckRequest {
    #[serde(rename = "commandIds")]
    command_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(rename = "commandId")]
    command_id: u64,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/api/data", get(data))
        .route("/api/cmd", get(cmd))
        .route("/api/capture", get(capture))
        .route("/api/capture-live", get(capture_live))
        .route("/api/history", get(history))
        .route("/api/queue-status", get(queue_status))
        .route("/api/pending-cmd", get(pending_cmd))
        .route("/api/cmd-ack", post(cmd_ack))
        .route("/api/log-summary", post(log_summary))
        .route("/api/live-frame", post(live_frame))
        .route("/api/cleanup/{scope}", post(cleanup))
        .route("/api/delete-command", post(delete_command))
        .with_state(app)
}

// ---------------------------------------------------------------------------
// Browser-facing handlers
// ---------------------------------------------------------------------------

/// Merged snapshot: latest telemetry, authoritative hardware state, message
/// ring, frame metadata. Side-effect-free.
async fn data(State(app): State<AppState>) -> impl IntoResponse {
    let st = app.shared.read().await;
    Json(st.data_snapshot())
}

/// Enqueue fan/LCD commands. Fan params also pre-set hardware state
/// optimistically (the device's next telemetry push overwrites it either
/// way); `msg` also lands in the LCD ring. Empty params are ignored.
async fn cmd(State(app): State<AppState>, Query(params): Query<CmdParams>) -> impl IntoResponse {
    let now = Utc::now().timestamp_millis();
    let mut st = app.shared.write().await;

    if let Some(raw) = params.fan1.as_deref().filter(|v| !v.is_empty()) {
        let v = raw.to_uppercase();
        st.hardware.f1 = (v == "ON") as u8;
        st.queue.enqueue(CommandKind::Fan1, v, now);
        info!(fan = 1, id = st.queue.last_id(), "fan command queued");
    }

    if let Some(raw) = params.fan2.as_deref().filter(|v| !v.is_empty()) {
        let v = raw.to_uppercase();
        st.hardware.f2 = (v == "ON") as u8;
        st.queue.enqueue(CommandKind::Fan2, v, now);
        info!(fan = 2, id = st.queue.last_id(), "fan command queued");
    }

    if let Some(msg) = params.msg.as_deref().filter(|m| !m.is_empty()) {
        st.queue.enqueue(CommandKind::Msg, msg, now);
        st.push_message(msg);
        info!(id = st.queue.last_id(), "lcd message queued");
    }

    Json(json!({
        "success": true,
        "queueLength": st.queue.len(),
        "lastCommandId": st.queue.last_id(),
        "hardwareState": st.hardware,
    }))
}

async fn capture(State(app): State<AppState>) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let id = st
        .queue
        .enqueue(CommandKind::Capture, "START_360_SCAN", Utc::now().timestamp_millis())
        .id;
    info!(id, "360 scan queued");
    Json(json!({ "success": true, "commandId": id, "queueLength": st.queue.len() }))
}

async fn capture_live(State(app): State<AppState>) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let id = st
        .queue
        .enqueue(CommandKind::CaptureLive, "MANUAL_LIVE_FRAME", Utc::now().timestamp_millis())
        .id;
    info!(id, "live frame queued");
    Json(json!({ "success": true, "commandId": id }))
}

async fn history(State(app): State<AppState>) -> impl IntoResponse {
    let st = app.shared.read().await;
    Json(json!({
        "count": st.history_len(),
        "data": st.history_tail(100),
    }))
}

async fn queue_status(State(app): State<AppState>) -> impl IntoResponse {
    let st = app.shared.read().await;
    let stats = st.queue.stats();
    Json(json!({
        "total": stats.total,
        "pending": stats.pending,
        "sent": stats.sent,
        "acked": stats.acked,
        "lastCommandId": st.queue.last_id(),
    }))
}

// ---------------------------------------------------------------------------
// Device-facing handlers
// ---------------------------------------------------------------------------

/// Device poll: hand out up to `batch_size` pending commands, marking the
/// delivered ones `sent`.
async fn pending_cmd(State(app): State<AppState>) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let commands = st.queue.pull_pending(app.cfg.batch_size);
    if !commands.is_empty() {
        info!(count = commands.len(), "delivering commands to device");
    }
    Json(json!({ "count": commands.len(), "commands": commands }))
}

/// Device report of executed command ids. Unknown ids are benign (duplicate
/// report or already-swept record); an absent/empty list is a caller error.
async fn cmd_ack(State(app): State<AppState>, Json(req): Json<AckRequest>) -> impl IntoResponse {
    let ids = match req.command_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "commandIds array required" })),
            );
        }
    };

    let mut st = app.shared.write().await;
    let out = st
        .queue
        .acknowledge(&ids, Utc::now().timestamp_millis(), app.cfg.retention_ms());
    info!(acked = out.acked, swept = out.cleaned, "device ack");

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "ackedCount": out.acked,
            "cleanedCount": out.cleaned,
            "queueLength": st.queue.len(),
        })),
    )
}

/// Authoritative telemetry push from the device.
async fn log_summary(
    State(app): State<AppState>,
    Json(summary): Json<TelemetrySummary>,
) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let entry = st.record_telemetry(summary);
    Json(json!({
        "message": "telemetry recorded",
        "recorded": entry,
        "hardwareStateSync": st.hardware,
    }))
}

/// Live-frame upload. Only the metadata is kept; the bytes themselves are
/// the device file server's business.
async fn live_frame(State(app): State<AppState>, body: Bytes) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    st.record_frame(body.len(), Utc::now().timestamp_millis());
    Json(json!({ "success": true, "frameSize": body.len() }))
}

// ---------------------------------------------------------------------------
// Administrative handlers
// ---------------------------------------------------------------------------

async fn cleanup(State(app): State<AppState>, Path(scope): Path<String>) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let deleted = match scope.as_str() {
        "all-commands" => st.queue.cleanup(CleanupScope::All),
        "pending-commands" => st.queue.cleanup(CleanupScope::Pending),
        "sent-commands" => st.queue.cleanup(CleanupScope::Sent),
        "acked-commands" => st.queue.cleanup(CleanupScope::Acked),
        "messages" => st.clear_messages(),
        "history" => st.clear_history(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown cleanup scope '{scope}'") })),
            );
        }
    };
    info!(scope = %scope, deleted, "cleanup");
    (
        StatusCode::OK,
        Json(json!({ "success": true, "deletedCount": deleted })),
    )
}

async fn delete_command(
    State(app): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    let mut st = app.shared.write().await;
    let deleted = st.queue.delete(req.command_id);
    Json(json!({ "success": deleted, "deletedCount": deleted as usize }))
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(app: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], app.cfg.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "relay listening");
    axum::serve(listener, router(app)).await?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
