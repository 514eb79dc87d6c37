// Demo front end: pairs a phone number over the in-memory loopback client,
// dispatches a message file to one target and prints the final task snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use session_relay::transport::loopback::LoopbackClient;
use session_relay::{
    DispatchRequest, Relay, RelayOptions, SessionId, Target, TaskId, TaskStatus,
    parse_message_lines,
};

/// How long to wait for a freshly paired session to connect
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval for session and task status
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "session-relay", version, about = "Bulk dispatch over a supervised session")]
struct Cli {
    /// Phone number to pair (any formatting; digits are kept)
    #[arg(long)]
    phone: String,

    /// Recipient phone number or group id
    #[arg(long)]
    target: String,

    /// Treat --target as a group id
    #[arg(long)]
    group: bool,

    /// File with one message per line
    #[arg(long)]
    messages: PathBuf,

    /// Seconds to wait between messages
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Text prepended to every message
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let options = RelayOptions::from_env()?;
    let raw = tokio::fs::read_to_string(&cli.messages)
        .await
        .with_context(|| format!("reading {}", cli.messages.display()))?;
    let messages = parse_message_lines(&raw);

    let client = Arc::new(LoopbackClient::new().with_pairing_code("LOOP-0000"));
    let relay = Relay::with_file_credentials(client, options);

    let pairing = relay.pair(&cli.phone).await?;
    match &pairing.code {
        Some(code) => log::info!("Pairing code for {}: {code}", pairing.phone_number),
        None => log::info!("No pairing code; scan the QR code from the logs"),
    }
    wait_until_connected(&relay, &pairing.session_id).await?;

    let target = if cli.group {
        Target::group(&cli.target)
    } else {
        Target::individual(&cli.target)
    };
    let task_id = relay.submit(DispatchRequest {
        session_id: pairing.session_id,
        target,
        messages,
        prefix: cli.prefix,
        delay_seconds: cli.delay,
    })?;
    log::info!("Task {task_id} started");

    tokio::select! {
        result = wait_until_completed(&relay, &task_id) => result?,
        _ = tokio::signal::ctrl_c() => {
            relay.request_stop(&task_id)?;
            wait_until_completed(&relay, &task_id).await?;
        }
    }

    let snapshot = relay.status(&task_id)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    relay.shutdown().await;
    Ok(())
}

async fn wait_until_connected(relay: &Relay<LoopbackClient>, session_id: &SessionId) -> Result<()> {
    let deadline = tokio::time::Instant::now() + CONNECT_TIMEOUT;
    loop {
        match relay.supervisor().session(session_id) {
            Some(session) if session.is_connected() => return Ok(()),
            Some(_) => {}
            None => bail!("session {session_id} was removed before connecting"),
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("session {session_id} did not connect within {CONNECT_TIMEOUT:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_until_completed(relay: &Relay<LoopbackClient>, task_id: &TaskId) -> Result<()> {
    while relay.status(task_id)?.status != TaskStatus::Completed {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}
