//! Command-line surfaces (§10.5): no subcommands, just §6's frozen
//! positional grammar plus the ambient flags from §10.3.

use std::path::PathBuf;

use clap::Parser;

/// `coordinator <interval_ms>` (§6).
#[derive(Debug, Parser)]
pub struct CoordinatorArgs {
    /// Tick interval in milliseconds; must be a positive integer.
    pub interval_ms: u64,

    /// Role table to load at startup (§6, §10.3).
    #[arg(long, default_value = "roles.txt")]
    pub roles: PathBuf,

    /// Where to persist the document body on clean shutdown (§10.6).
    #[arg(long, default_value = "document.md")]
    pub persist_to: PathBuf,

    /// Fixed capacity of the session table (§3).
    #[arg(long, default_value_t = 10)]
    pub max_sessions: usize,

    /// Widen logging to `debug` by default (still overridable by `RUST_LOG`).
    #[arg(long)]
    pub debug: bool,
}

/// `editor <coordinator_pid> <username>` (§6).
#[derive(Debug, Parser)]
pub struct EditorArgs {
    /// PID of the coordinator process to connect to.
    pub coordinator_pid: u32,

    /// Identity presented during the handshake (§4.4).
    pub username: String,

    #[arg(long)]
    pub debug: bool,
}
