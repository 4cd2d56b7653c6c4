//! The editor binary (§6): `editor <coordinator_pid> <username>`.

use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use parchment::cli::EditorArgs;
use parchment::commands::Command;
use parchment::coordinator;
use parchment::replica::{read_message, Message, Replica};
use parchment::roles::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = EditorArgs::parse();
    parchment::logging::initialize(args.debug);

    let socket_path = coordinator::socket_path(args.coordinator_pid);
    let stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("connecting to coordinator at {}", socket_path.display()))?;

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Arc::new(AsyncMutex::new(write_half));

    writer
        .lock()
        .await
        .write_all(format!("{}\n", args.username).as_bytes())
        .await
        .context("sending handshake username")?;

    let mut role_line = String::new();
    reader
        .read_line(&mut role_line)
        .await
        .context("reading handshake role")?;
    let role_line = role_line.trim();
    if let Some(reason) = role_line.strip_prefix("Reject ") {
        anyhow::bail!("coordinator rejected the connection: {reason}");
    }
    let role = match role_line {
        "write" => Role::Write,
        "read" => Role::Read,
        other => anyhow::bail!("unexpected handshake role {other:?}"),
    };
    println!("Connected as {role_line}");

    let (version, body) = match read_message(&mut reader)
        .await
        .context("reading handshake snapshot")?
    {
        Some(Message::Snapshot { version, body }) => (version, body),
        _ => anyhow::bail!("expected a snapshot immediately after the handshake role"),
    };
    let replica = Arc::new(AsyncMutex::new(
        Replica::from_snapshot(version, &body).context("building initial replica")?,
    ));

    let reader_handle = tokio::spawn(reader_task(reader, replica.clone(), writer.clone()));

    stdin_loop(writer, replica, role).await;

    reader_handle.abort();
    Ok(())
}

/// Replays broadcast frames against the replica, and drives resync (§4.6)
/// whenever a frame doesn't apply cleanly.
async fn reader_task(
    mut reader: BufReader<OwnedReadHalf>,
    replica: Arc<AsyncMutex<Replica>>,
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
) {
    loop {
        match read_message(&mut reader).await {
            Ok(Some(Message::Frame(lines))) => {
                let mut r = replica.lock().await;
                let borrowed = lines.iter().map(String::as_str);
                if r.apply_frame(borrowed).is_err() {
                    drop(r);
                    warn!("replica drifted from the coordinator; requesting resync");
                    if writer.lock().await.write_all(b"DOC?\n").await.is_err() {
                        return;
                    }
                }
            }
            Ok(Some(Message::Snapshot { version, body })) => match Replica::from_snapshot(version, &body) {
                Ok(fresh) => {
                    *replica.lock().await = fresh;
                    info!(version, "replica resynchronised");
                }
                Err(error) => error!(%error, "resync snapshot was malformed"),
            },
            Ok(None) => {
                info!("coordinator closed the connection");
                return;
            }
            Err(error) => {
                warn!(%error, "error reading from coordinator");
                return;
            }
        }
    }
}

/// Reads local editor commands from stdin (§10.5): `DOC?`, `PERM?` and
/// `LOG?` are answered entirely locally, `DISCONNECT` closes the session,
/// and everything else is validated and forwarded as `<version> <command>`.
async fn stdin_loop(writer: Arc<AsyncMutex<OwnedWriteHalf>>, replica: Arc<AsyncMutex<Replica>>, role: Role) {
    let log: StdMutex<Vec<String>> = StdMutex::new(Vec::new());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => return,
        };
        if line.is_empty() {
            continue;
        }
        log.lock().expect("log mutex poisoned").push(line.clone());

        match line.as_str() {
            "DOC?" => println!("{}", replica.lock().await.text()),
            "PERM?" => println!("{}", role.wire_name()),
            "LOG?" => {
                for entry in log.lock().expect("log mutex poisoned").iter() {
                    println!("{entry}");
                }
            }
            "DISCONNECT" => {
                let _ = writer.lock().await.write_all(b"DISCONNECT\n").await;
                return;
            }
            _ => send_edit(&writer, &replica, role, &line).await,
        }
    }
}

async fn send_edit(writer: &AsyncMutex<OwnedWriteHalf>, replica: &AsyncMutex<Replica>, role: Role, line: &str) {
    if Command::parse(line).is_err() {
        println!("Error: unrecognised command.");
        return;
    }
    if role != Role::Write {
        println!("Error: you do not have write permission.");
        return;
    }
    let version = replica.lock().await.version();
    let wire = format!("{version} {line}\n");
    if writer.lock().await.write_all(wire.as_bytes()).await.is_err() {
        warn!("failed to send command to coordinator");
    }
}
