//! The batch scheduler (§4.3): the fixed-interval tick that drains the
//! intake queue and turns it into a committed version step.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::broadcast::Frame;
use crate::cmdlog::CommandLog;
use crate::document::Document;
use crate::queue::Queue;
use crate::roles::Role;
use crate::session::SessionTable;
use crate::shutdown::Shutdown;
use crate::status::EditStatus;

/// Runs ticks forever at `interval`, until `shutdown` is requested. The
/// sleep between ticks is the scheduler's only cancellable suspension point.
pub async fn run(
    interval: Duration,
    document: Arc<AsyncMutex<Document>>,
    queue: Arc<StdMutex<Queue>>,
    sessions: Arc<StdMutex<SessionTable>>,
    cmd_log: Arc<CommandLog>,
    shutdown: Arc<Shutdown>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.requested() => {
                info!("scheduler stopping: shutdown requested");
                return;
            }
        }
        run_tick(&document, &queue, &sessions, &cmd_log).await;
    }
}

/// One tick (§4.3 steps 2-5): drain, sort, apply, and, if anything happened,
/// broadcast and advance the version.
async fn run_tick(
    document: &AsyncMutex<Document>,
    queue: &StdMutex<Queue>,
    sessions: &StdMutex<SessionTable>,
    cmd_log: &CommandLog,
) {
    let batch = {
        let mut q = queue.lock().expect("queue mutex poisoned");
        q.drain_sorted()
    };
    if batch.is_empty() {
        return;
    }

    // Resolve every submitter's role up front, while the session table lock
    // is held on its own (§5 lock order: table before document, never
    // nested with it), so the document lock below never has to reacquire it.
    let roles: std::collections::HashMap<&str, Option<Role>> = {
        let table = sessions.lock().expect("session table mutex poisoned");
        batch
            .iter()
            .map(|entry| (entry.username.as_str(), table.role_of_username(&entry.username)))
            .collect()
    };

    let mut doc = document.lock().await;
    for entry in &batch {
        let role = roles.get(entry.username.as_str()).copied().flatten();
        match role {
            None | Some(Role::None) => {
                debug!(user = %entry.username, "dropping command from unconnected or unauthorised user");
            }
            Some(Role::Read) => {
                doc.reject(
                    &entry.username,
                    &entry.raw_cmd,
                    entry.submitted_version,
                    EditStatus::Unauthorized,
                );
            }
            Some(Role::Write) => {
                if doc.apply(&entry.username, &entry.raw_cmd, entry.submitted_version).is_none() {
                    debug!(user = %entry.username, raw_cmd = %entry.raw_cmd, "dropping unparsable command");
                }
            }
        }
    }

    if doc.pending().is_empty() {
        return;
    }

    // §4.3 step 5 / §5: the frame for this tick must be handed to the
    // broadcaster before the version is incremented, so a concurrent `DOC?`
    // or handshake can never observe version T+1 before T's frame has gone
    // out. Capture the pending batch, release the document, broadcast, then
    // reacquire the lock just to close the tick out.
    let version = doc.version();
    let records = doc.pending().to_vec();
    drop(doc);

    cmd_log.record_tick(version, &records);
    info!(version, applied = records.len(), "tick committing");
    let frame = Frame::new(version, records);
    broadcast_frame(sessions, &frame).await;

    document.lock().await.close_tick();
    info!(version, "tick committed");
}

/// Writes the frame to every active session (§4.5), dropping (and evicting)
/// any session whose write fails. The table lock is held only long enough
/// to collect the write targets; the writes themselves happen outside it.
async fn broadcast_frame(sessions: &StdMutex<SessionTable>, frame: &Frame) {
    let lines = frame.to_lines();
    let targets = sessions
        .lock()
        .expect("session table mutex poisoned")
        .active_handles();

    let mut dead = Vec::new();
    for handle in targets {
        if handle.write_lines(&lines).await.is_err() {
            dead.push(handle.id);
        }
    }

    if !dead.is_empty() {
        let mut table = sessions.lock().expect("session table mutex poisoned");
        for id in dead {
            tracing::warn!(session = id, "dropping session after failed broadcast write");
            table.remove(id);
        }
    }
}
