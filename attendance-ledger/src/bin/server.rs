//! Attendance ledger server binary
//!
//! Reads newline-delimited JSON requests on stdin and writes one JSON
//! response per line on stdout. Logs go to stderr.
//!
//! Usage: `attendance-server [config.toml]` (falls back to `ATTENDANCE_*`
//! environment variables).

use anyhow::Context;
use attendance_ledger::{
    service::{dispatch, Request},
    Config, Ledger,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    init_tracing(config.log_json);

    tracing::info!(data_dir = ?config.data_dir, "Starting attendance ledger");

    let ledger = Ledger::open(config).await.context("opening ledger")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading request")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(request) => serde_json::to_string(&dispatch(&ledger, request).await)?,
            Err(e) => {
                tracing::warn!("Malformed request: {}", e);
                serde_json::json!({
                    "ok": false,
                    "error": { "code": "malformed_request", "message": e.to_string() }
                })
                .to_string()
            }
        };

        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("Shutting down attendance ledger");
    ledger.shutdown().await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
