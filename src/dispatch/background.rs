//! Send loop for dispatch tasks
//!
//! One spawned task per dispatch task. Sends happen strictly in input
//! order; the loop suspends only on the send itself and on the delay that
//! follows it, and checks for a stop request between messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::helpers::compose_text;
use crate::error::{RelayError, Result};
use crate::registry::{SessionRegistry, TaskRegistry};
use crate::transport::MessagingClient;
use crate::types::identifiers::{SessionId, TaskId};
use crate::types::target::Target;

/// Everything a send loop needs, owned by the loop
pub(super) struct SendLoopContext<C: MessagingClient> {
    pub client: Arc<C>,
    pub sessions: SessionRegistry<C::Connection>,
    pub tasks: TaskRegistry,
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub target: Target,
    pub messages: Arc<[String]>,
    pub prefix: Option<String>,
    pub delay: Duration,
    pub retention: Duration,
}

/// Spawn the send loop and return its handle
pub(super) fn spawn_send_loop<C: MessagingClient>(ctx: SendLoopContext<C>) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_send_loop(&ctx).await;
        schedule_removal(ctx.tasks.clone(), ctx.task_id.clone(), ctx.retention);
    })
}

async fn run_send_loop<C: MessagingClient>(ctx: &SendLoopContext<C>) {
    let total = ctx.messages.len();
    log::info!(
        "[{}] starting: {total} message(s) to {} via {}",
        ctx.task_id,
        ctx.target,
        ctx.session_id
    );

    for (index, message) in ctx.messages.iter().enumerate() {
        if !ctx.tasks.is_running(&ctx.task_id) {
            log::info!("[{}] stop requested; exiting before message {}", ctx.task_id, index + 1);
            break;
        }

        let text = compose_text(ctx.prefix.as_deref(), message);
        match send_one(ctx, &text).await {
            Ok(()) => {
                ctx.tasks
                    .update(&ctx.task_id, |task| task.record_sent(Utc::now()));
                log::debug!("[{}] sent {}/{total}", ctx.task_id, index + 1);
            }
            Err(e) => {
                ctx.tasks.update(&ctx.task_id, |task| task.record_failure());
                log::warn!("[{}] failed to send {}/{total}: {e}", ctx.task_id, index + 1);
            }
        }

        if index + 1 < total {
            tokio::time::sleep(ctx.delay).await;
        }
    }

    let finished = ctx.tasks.update(&ctx.task_id, |task| {
        task.complete(Utc::now());
        (task.sent_count, task.failed_count)
    });
    if let Some((sent, failed)) = finished {
        log::info!(
            "[{}] completed: sent {sent}/{total}, failed {failed}",
            ctx.task_id
        );
    }
}

/// One delivery attempt through the session's current connection
async fn send_one<C: MessagingClient>(ctx: &SendLoopContext<C>, text: &str) -> Result<()> {
    let lease = ctx
        .sessions
        .lease(&ctx.session_id)
        .ok_or_else(|| RelayError::send(format!("session {} is gone", ctx.session_id)))?;
    if !lease.session.is_connected() {
        return Err(RelayError::send(format!(
            "session {} is {:?}",
            ctx.session_id, lease.session.status
        )));
    }

    let _guard = lease.send_lock.lock().await;
    ctx.client.send(&lease.connection, &ctx.target, text).await
}

fn schedule_removal(tasks: TaskRegistry, task_id: TaskId, retention: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(retention).await;
        if tasks.remove(&task_id).is_some() {
            log::debug!("[{task_id}] removed after retention");
        }
    });
}
