//! Session establishment and the per-connection command loop (§4.4).
//!
//! The intake grammar sent by a client for a mutating command is
//! `<submitted_version> <command-line>`, where `<command-line>` is exactly
//! the §4.2 grammar. The reference source never transmits a version at all
//! (its `parse_command` hard-codes `*version = 0` with a comment disabling
//! the check entirely), which is why it can never produce `OUTDATED_VERSION`;
//! this implementation carries the version the client read, the same way
//! every other positional argument already travels, so that optimistic
//! concurrency (§3, §8 scenario S3) is real. `DISCONNECT`, `DOC?` and `PERM?`
//! carry no version prefix, since they never become edit records.

use std::io;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::document::Document;
use crate::queue::{IntakeEntry, Queue};
use crate::roles::{Role, RoleTable};

/// A connected editor's identity and the half of the stream used to reply
/// to it or to fan broadcast frames out to it.
pub struct SessionHandle {
    pub id: usize,
    pub username: String,
    pub role: Role,
    writer: AsyncMutex<OwnedWriteHalf>,
}

impl SessionHandle {
    /// Writes each of `lines` terminated by `\n`. No line in this protocol
    /// ever contains an embedded newline, so no escaping is needed.
    pub async fn write_lines(&self, lines: &[String]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        for line in lines {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await
    }

    async fn write_line(&self, line: &str) -> io::Result<()> {
        self.write_lines(std::slice::from_ref(&line.to_string())).await
    }

    /// Writes a version/length/body snapshot: the handshake format (§6),
    /// reused verbatim for `DOC?` replies since §4.6 rebuilds a replica "from
    /// the snapshot reply" after a resync, i.e. the very same shape.
    async fn write_snapshot(&self, version: u64, body: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("{version}\n{}\n", body.len()).as_bytes())
            .await?;
        writer.write_all(body.as_bytes()).await?;
        writer.flush().await
    }
}

/// Fixed-capacity table of active sessions (§3, §5 lock ordering: table
/// before document before queue). A free slot is `None`.
#[derive(Default)]
pub struct SessionTable {
    slots: Vec<Option<Arc<SessionHandle>>>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Reserves the first free slot (§4.4 step 2); `None` means the table is full.
    pub fn reserve(&mut self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn insert(&mut self, id: usize, handle: Arc<SessionHandle>) {
        self.slots[id] = Some(handle);
    }

    pub fn remove(&mut self, id: usize) {
        self.slots[id] = None;
    }

    pub fn role_of_username(&self, username: &str) -> Option<Role> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.username == username)
            .map(|s| s.role)
    }

    /// Every currently active handle, for the broadcaster to fan out to.
    pub fn active_handles(&self) -> Vec<Arc<SessionHandle>> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Splits a mutating command's wire line into its submitted version and the
/// bare §4.2 command text. Returns `None` for anything that doesn't start
/// with a decimal version (§7: dropped silently, same as any other
/// unparsable line).
fn split_version_prefix(line: &str) -> Option<(u64, &str)> {
    let (version, rest) = line.split_once(' ')?;
    Some((version.parse().ok()?, rest))
}

/// Drives one accepted connection end to end: handshake, then the command
/// loop, until `DISCONNECT`, EOF, or a fatal I/O error.
pub async fn handle_connection(
    stream: UnixStream,
    sessions: Arc<StdMutex<SessionTable>>,
    roles: Arc<RoleTable>,
    queue: Arc<StdMutex<Queue>>,
    document: Arc<AsyncMutex<Document>>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut username_line = String::new();
    if matches!(reader.read_line(&mut username_line).await, Err(_) | Ok(0)) {
        return;
    }
    let username = username_line.trim().to_string();
    if username.is_empty() {
        return;
    }

    let role = roles.role_of(&username);
    let writer = AsyncMutex::new(write_half);

    if role == Role::None {
        let mut w = writer.lock().await;
        let _ = w.write_all(b"Reject UNAUTHORISED.\n").await;
        return;
    }

    let id = {
        let mut table = sessions.lock().expect("session table mutex poisoned");
        match table.reserve() {
            Some(id) => id,
            None => {
                warn!(%username, "session table full, dropping connection");
                return;
            }
        }
    };

    let handle = Arc::new(SessionHandle {
        id,
        username: username.clone(),
        role,
        writer,
    });

    if handle.write_line(role.wire_name()).await.is_err() {
        return;
    }
    let (version, body) = {
        let doc = document.lock().await;
        (doc.version(), doc.text())
    };
    if handle.write_snapshot(version, &body).await.is_err() {
        return;
    }

    sessions
        .lock()
        .expect("session table mutex poisoned")
        .insert(id, handle.clone());
    info!(session = id, user = %username, %role, "session established");

    command_loop(&mut reader, &handle, &queue, &document).await;

    sessions.lock().expect("session table mutex poisoned").remove(id);
    info!(session = id, user = %username, "session closed");
}

async fn command_loop(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
    handle: &Arc<SessionHandle>,
    queue: &Arc<StdMutex<Queue>>,
    document: &Arc<AsyncMutex<Document>>,
) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }

        match line {
            "DISCONNECT" => return,
            "DOC?" => {
                let (version, body) = {
                    let doc = document.lock().await;
                    (doc.version(), doc.text())
                };
                if handle.write_snapshot(version, &body).await.is_err() {
                    return;
                }
            }
            "PERM?" => {
                if handle.write_line(handle.role.wire_name()).await.is_err() {
                    return;
                }
            }
            line => {
                if let Some((submitted_version, raw_cmd)) = split_version_prefix(line) {
                    queue
                        .lock()
                        .expect("queue mutex poisoned")
                        .push(IntakeEntry::new(&handle.username, raw_cmd, submitted_version));
                }
            }
        }
    }
}

impl Role {
    /// The exact token this role is reported as in a handshake/`PERM?` reply.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_version_prefix_separates_version_from_command() {
        assert_eq!(
            split_version_prefix("3 INSERT 0 hi"),
            Some((3, "INSERT 0 hi"))
        );
    }

    #[test]
    fn split_version_prefix_rejects_missing_version() {
        assert_eq!(split_version_prefix("INSERT 0 hi"), None);
        assert_eq!(split_version_prefix("INSERT"), None);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn handle_connection_logs_establishment_and_teardown() {
        let (client, server) = UnixStream::pair().unwrap();
        let sessions = Arc::new(StdMutex::new(SessionTable::new(2)));
        let queue = Arc::new(StdMutex::new(Queue::new()));
        let document = Arc::new(AsyncMutex::new(Document::new()));
        let roles_dir = temp_dir::TempDir::new().unwrap();
        let roles_path = roles_dir.path().join("roles.txt");
        std::fs::write(&roles_path, "alice write\n").unwrap();
        let roles = Arc::new(RoleTable::load(&roles_path).unwrap());

        let driver = tokio::spawn(handle_connection(server, sessions, roles, queue, document));

        let (mut read_half, mut write_half) = client.into_split();
        write_half.write_all(b"alice\n").await.unwrap();

        let mut reader = BufReader::new(&mut read_half);
        let mut role_line = String::new();
        reader.read_line(&mut role_line).await.unwrap();
        assert_eq!(role_line.trim(), "write");

        write_half.write_all(b"DISCONNECT\n").await.unwrap();
        driver.await.unwrap();

        assert!(logs_contain("session established"));
        assert!(logs_contain("session closed"));
    }

    #[test]
    fn reserve_and_remove_reuse_slots() {
        let (_keep_alive, theirs) = UnixStream::pair().unwrap();
        let (_read_half, write_half) = theirs.into_split();

        let mut table = SessionTable::new(2);
        let a = table.reserve().unwrap();
        table.insert(
            a,
            Arc::new(SessionHandle {
                id: a,
                username: "alice".into(),
                role: Role::Write,
                writer: AsyncMutex::new(write_half),
            }),
        );
        assert_eq!(table.active_count(), 1);
        table.remove(a);
        assert_eq!(table.active_count(), 0);
        assert_eq!(table.reserve(), Some(0));
    }
}
