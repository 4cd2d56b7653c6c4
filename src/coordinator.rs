//! The coordinator process (§4.4, §5): accepts sessions, runs the
//! scheduler, and owns the shutdown sequence.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::cmdlog::CommandLog;
use crate::document::Document;
use crate::persistence;
use crate::queue::Queue;
use crate::roles::RoleTable;
use crate::scheduler;
use crate::session::{self, SessionTable};
use crate::shutdown::Shutdown;

/// Deterministic socket path from the coordinator's PID (§10.3), so an
/// editor given only `<coordinator_pid>` can compute it unaided.
pub fn socket_path(pid: u32) -> PathBuf {
    std::env::temp_dir().join(format!("parchment-coordinator-{pid}.sock"))
}

pub struct Coordinator {
    document: Arc<AsyncMutex<Document>>,
    sessions: Arc<StdMutex<SessionTable>>,
    queue: Arc<StdMutex<Queue>>,
    roles: Arc<RoleTable>,
    cmd_log: Arc<CommandLog>,
    shutdown: Arc<Shutdown>,
}

impl Coordinator {
    pub fn new(roles: RoleTable, max_sessions: usize) -> Arc<Self> {
        Arc::new(Self {
            document: Arc::new(AsyncMutex::new(Document::new())),
            sessions: Arc::new(StdMutex::new(SessionTable::new(max_sessions))),
            queue: Arc::new(StdMutex::new(Queue::new())),
            roles: Arc::new(roles),
            cmd_log: Arc::new(CommandLog::new()),
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    /// Runs until `QUIT` is accepted on stdin: binds the listening socket,
    /// spawns the accept loop and the scheduler, then drives the operator
    /// command loop on the current task. Persists and tears down the socket
    /// before returning.
    pub async fn run(
        self: Arc<Self>,
        socket_path: &Path,
        interval: Duration,
        persist_to: &Path,
    ) -> anyhow::Result<()> {
        let _ = std::fs::remove_file(socket_path);
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("binding coordinator socket {}", socket_path.display()))?;

        println!("Server PID: {}", std::process::id());
        info!(path = %socket_path.display(), "listening");

        let accept_task = tokio::spawn(accept_loop(
            listener,
            self.sessions.clone(),
            self.roles.clone(),
            self.queue.clone(),
            self.document.clone(),
            self.shutdown.clone(),
        ));
        let scheduler_task = tokio::spawn(scheduler::run(
            interval,
            self.document.clone(),
            self.queue.clone(),
            self.sessions.clone(),
            self.cmd_log.clone(),
            self.shutdown.clone(),
        ));

        self.clone().operator_loop().await;

        accept_task.abort();
        scheduler_task.await.context("scheduler task panicked")?;

        let body = self.document.lock().await.text();
        persistence::save(persist_to, &body)?;
        let _ = std::fs::remove_file(socket_path);
        info!("coordinator shut down cleanly");
        Ok(())
    }

    /// Reads `QUIT` from stdin, rejecting it while sessions remain (§5).
    /// A Ctrl+C or SIGTERM shuts down unconditionally: an operator signal is
    /// a direct order, not subject to the same courtesy check as a typed
    /// `QUIT`.
    async fn operator_loop(self: Arc<Self>) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl+C, shutting down");
                    self.shutdown.request();
                    return;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    self.shutdown.request();
                    return;
                }
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            warn!("stdin closed without QUIT; shutting down");
                            self.shutdown.request();
                            return;
                        }
                        Err(error) => {
                            warn!(%error, "error reading operator command");
                            continue;
                        }
                    };
                    if line.trim() != "QUIT" {
                        continue;
                    }
                    let active = self
                        .sessions
                        .lock()
                        .expect("session table mutex poisoned")
                        .active_count();
                    if active == 0 {
                        self.shutdown.request();
                        return;
                    }
                    println!("QUIT rejected, {active} client(s) still connected.");
                }
            }
        }
    }
}

async fn accept_loop(
    listener: UnixListener,
    sessions: Arc<StdMutex<SessionTable>>,
    roles: Arc<RoleTable>,
    queue: Arc<StdMutex<Queue>>,
    document: Arc<AsyncMutex<Document>>,
    shutdown: Arc<Shutdown>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        tokio::spawn(session::handle_connection(
                            stream,
                            sessions.clone(),
                            roles.clone(),
                            queue.clone(),
                            document.clone(),
                        ));
                    }
                    Err(error) => warn!(%error, "failed to accept connection"),
                }
            }
            _ = shutdown.requested() => return,
        }
    }
}
