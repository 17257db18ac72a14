mod actuators;
mod relay;
#[cfg(feature = "sim")]
mod sim;

use anyhow::Result;
use std::{env, time::Duration};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use actuators::Actuators;
use relay::{RelayClient, TelemetrySummary};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let relay_url = env::var("RELAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let poll_every_s: u64 = env::var("POLL_EVERY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let telemetry_every_s: u64 = env::var("TELEMETRY_EVERY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(15);

    #[cfg(feature = "sim")]
    let mut climate = {
        let scenario =
            sim::Scenario::from_str_lossy(&env::var("SIM_SCENARIO").unwrap_or_default());
        info!(%scenario, "climate simulator active");
        sim::ClimateSim::new(scenario, 600.0)
    };

    let client = RelayClient::new(relay_url.clone());
    let mut hw = Actuators::new();

    info!(relay = %relay_url, poll_every_s, telemetry_every_s, "device started");

    let mut ticker = interval(Duration::from_secs(poll_every_s));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_telemetry: Option<Instant> = None;

    loop {
        ticker.tick().await;

        // ── Command poll ────────────────────────────────────────────
        // Errors are logged and retried on the next tick; the relay keeps
        // undelivered commands pending, so nothing is lost.
        match client.fetch_pending().await {
            Ok(commands) => {
                let mut executed: Vec<u64> = Vec::with_capacity(commands.len());
                for cmd in &commands {
                    hw.execute(cmd);
                    // Ack regardless of execution outcome: delivery is done
                    // once the device has seen the command.
                    executed.push(cmd.id);
                }
                if let Err(e) = client.acknowledge(&executed).await {
                    warn!("ack failed: {e:#}");
                }
            }
            Err(e) => warn!("poll failed: {e:#}"),
        }

        // ── Telemetry push ──────────────────────────────────────────
        let due = last_telemetry
            .map_or(true, |t| t.elapsed() >= Duration::from_secs(telemetry_every_s));
        if due {
            last_telemetry = Some(Instant::now());

            #[cfg(feature = "sim")]
            let sample = Some(climate.sample(hw.fans_on()));
            #[cfg(not(feature = "sim"))]
            let sample: Option<NoSample> = None;

            let summary = TelemetrySummary {
                t: sample.map(|r| r.t),
                h: sample.map(|r| r.h),
                s: sample.map(|r| r.s),
                ht: None,
                f1: hw.fan1 as u8,
                f2: hw.fan2 as u8,
                shk: 0,
                st: "OK".to_string(),
            };

            match client.push_telemetry(&summary).await {
                Ok(sync) => {
                    info!(f1 = sync.f1, f2 = sync.f2, "telemetry pushed");
                }
                Err(e) => warn!("telemetry push failed: {e:#}"),
            }
        }
    }
}

/// Placeholder sample type when the simulator is compiled out (no sensor
/// source: telemetry carries actuator state only).
#[cfg(not(feature = "sim"))]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct NoSample {
    t: f64,
    h: f64,
    s: f64,
}
