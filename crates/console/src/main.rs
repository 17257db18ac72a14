mod api;
mod controller;

use anyhow::Result;
use std::{env, time::Duration};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use api::{Fan, HttpRelay, RelayApi};
use controller::Panel;

const HELP: &str = "commands: f1 | f2 | msg <text> | scan | live | data | queue | help | quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let relay_url = env::var("RELAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let poll_every_s: u64 = env::var("POLL_EVERY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let api = HttpRelay::new(relay_url.clone());
    let mut panel = Panel::new();

    println!("antares console — relay {relay_url}");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(poll_every_s));

    loop {
        tokio::select! {
            // Background reconcile: authoritative state bounds any
            // optimistic divergence to one polling interval.
            _ = ticker.tick() => {
                if let Ok(data) = api.fetch_data().await {
                    panel.reconcile(&data);
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                let (word, rest) = line.split_once(' ').unwrap_or((line, ""));

                match word {
                    "f1" => { panel.toggle_fan(&api, Fan::Fan1).await; }
                    "f2" => { panel.toggle_fan(&api, Fan::Fan2).await; }
                    "msg" if !rest.is_empty() => panel.send_message(&api, rest).await,
                    "msg" => println!("usage: msg <text>"),
                    "scan" => panel.trigger_scan(&api).await,
                    "live" => panel.trigger_live_frame(&api).await,
                    "data" => match api.fetch_data().await {
                        Ok(data) => {
                            panel.reconcile(&data);
                            print_data(&data);
                        }
                        Err(e) => println!("data fetch failed: {e:#}"),
                    },
                    "queue" => match api.queue_status().await {
                        Ok(q) => println!(
                            "queue: total={} pending={} sent={} acked={} last_id={}",
                            q.total, q.pending, q.sent, q.acked, q.last_command_id
                        ),
                        Err(e) => println!("queue fetch failed: {e:#}"),
                    },
                    "help" => println!("{HELP}"),
                    "quit" | "exit" => break,
                    "" => {}
                    other => println!("unknown command '{other}' — {HELP}"),
                }

                // Failures block until the operator has seen them.
                if let Some(alert) = panel.take_alert() {
                    println!("!! {alert}");
                    println!("   press enter to continue");
                    lines.next_line().await?;
                }

                if let Some(status) = panel.status_line() {
                    println!("[{status}]");
                }
                println!(
                    "fan1={} fan2={}",
                    panel.displayed(Fan::Fan1),
                    panel.displayed(Fan::Fan2)
                );
            }
        }
    }

    Ok(())
}

fn print_data(data: &api::DataSnapshot) {
    let fmt = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_else(|| "--".to_string());
    println!(
        "t={} h={} s={} fan1={} fan2={}",
        fmt(data.t),
        fmt(data.h),
        fmt(data.s),
        data.f1,
        data.f2
    );
    for msg in &data.messages {
        println!("  lcd [{}] {}", msg.timestamp, msg.text);
    }
}
