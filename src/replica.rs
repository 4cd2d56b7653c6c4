//! The editor-side replica applier (§4.6): keeps a local document converged
//! with the coordinator by replaying broadcast frames.

use std::fmt;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncReadExt};

use crate::broadcast::FrameLine;
use crate::commands::{apply_command, Command};
use crate::piece::{OutOfRange, PieceList};

/// One unit of server-to-client traffic: either a broadcast frame or a
/// version/length/body snapshot (handshake reply, or a resync after drift).
/// A snapshot's header is a bare decimal; a frame's is `VERSION <v>`. The two
/// can never be confused, so a reader doesn't need to know in advance which
/// one is coming next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Frame(Vec<String>),
    Snapshot { version: u64, body: String },
}

/// Reads the next [`Message`] off `reader`. Returns `Ok(None)` on a clean EOF
/// before any bytes of a new message arrived.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<Message>>
where
    R: AsyncBufReadExt + AsyncReadExt + Unpin,
{
    let mut header = String::new();
    if reader.read_line(&mut header).await? == 0 {
        return Ok(None);
    }
    let header = header.trim_end_matches(['\n', '\r']);

    if let Some(rest) = header.strip_prefix("VERSION ") {
        let mut lines = vec![format!("VERSION {rest}")];
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            let is_end = line == "END";
            lines.push(line);
            if is_end {
                break;
            }
        }
        return Ok(Some(Message::Frame(lines)));
    }

    let version: u64 = header
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "expected a snapshot version"))?;
    let mut length_line = String::new();
    reader.read_line(&mut length_line).await?;
    let length: usize = length_line
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "expected a snapshot length"))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let body = String::from_utf8(body)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "snapshot body was not utf-8"))?;
    Ok(Some(Message::Snapshot { version, body }))
}

/// The frame didn't match the replica's expected version, or one of its
/// records failed to replay. The caller should issue `DOC?` and rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaDrift;

impl fmt::Display for ReplicaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("replica drifted from the coordinator; resynchronising")
    }
}

/// An editor's local copy of the document.
pub struct Replica {
    piece_list: PieceList,
    version: u64,
}

impl Replica {
    /// Builds (or rebuilds, on resync) a replica from a version/body snapshot,
    /// the same shape sent at handshake and replayed by a `DOC?` reply.
    pub fn from_snapshot(version: u64, body: &str) -> Result<Self, OutOfRange> {
        let mut piece_list = PieceList::new();
        if !body.is_empty() {
            piece_list.insert(0, body)?;
        }
        Ok(Self { piece_list, version })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> String {
        self.piece_list.flatten()
    }

    /// Applies one already-split broadcast frame: a `VERSION v` header, zero
    /// or more `EDIT` lines, and a trailing `END`. Advances `version` by one
    /// on success; any mismatch leaves the replica untouched and reports
    /// drift for the caller to resolve with a resync.
    pub fn apply_frame<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Result<(), ReplicaDrift> {
        let mut lines = lines.into_iter();

        match lines.next().and_then(FrameLine::parse) {
            Some(FrameLine::Version(v)) if v == self.version => {}
            _ => return Err(ReplicaDrift),
        }

        let mut staged = self.piece_list.clone();
        for line in lines {
            match FrameLine::parse(line) {
                Some(FrameLine::End) => {
                    self.piece_list = staged;
                    self.version += 1;
                    return Ok(());
                }
                Some(FrameLine::Edit { raw_cmd, status, .. }) if status.is_success() => {
                    let cmd = Command::parse(&raw_cmd).map_err(|_| ReplicaDrift)?;
                    apply_command(&mut staged, &cmd).map_err(|_| ReplicaDrift)?;
                }
                Some(FrameLine::Edit { .. }) => {}
                _ => return Err(ReplicaDrift),
            }
        }
        Err(ReplicaDrift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_successful_edits_and_advances_version() {
        let mut replica = Replica::from_snapshot(0, "").unwrap();
        let frame = ["VERSION 0", "EDIT alice INSERT 0 Hello SUCCESS", "END"];
        replica.apply_frame(frame).unwrap();
        assert_eq!(replica.text(), "Hello");
        assert_eq!(replica.version(), 1);
    }

    #[test]
    fn skips_rejected_records() {
        let mut replica = Replica::from_snapshot(0, "Hello").unwrap();
        let frame = [
            "VERSION 0",
            "EDIT bob BOLD 0 50 Reject INVALID_POSITION",
            "END",
        ];
        replica.apply_frame(frame).unwrap();
        assert_eq!(replica.text(), "Hello");
        assert_eq!(replica.version(), 1);
    }

    #[test]
    fn version_mismatch_is_drift() {
        let mut replica = Replica::from_snapshot(3, "Hello").unwrap();
        let frame = ["VERSION 0", "END"];
        assert_eq!(replica.apply_frame(frame), Err(ReplicaDrift));
        assert_eq!(replica.version(), 3);
        assert_eq!(replica.text(), "Hello");
    }

    #[test]
    fn failing_replay_is_drift_and_does_not_partially_mutate() {
        let mut replica = Replica::from_snapshot(0, "hi").unwrap();
        let frame = [
            "VERSION 0",
            "EDIT alice INSERT 0 ok SUCCESS",
            "EDIT alice INSERT 999 nope SUCCESS",
            "END",
        ];
        assert_eq!(replica.apply_frame(frame), Err(ReplicaDrift));
        assert_eq!(replica.text(), "hi");
        assert_eq!(replica.version(), 0);
    }

    #[test]
    fn missing_end_terminator_is_drift() {
        let mut replica = Replica::from_snapshot(0, "").unwrap();
        let frame = ["VERSION 0", "EDIT alice INSERT 0 hi SUCCESS"];
        assert_eq!(replica.apply_frame(frame), Err(ReplicaDrift));
    }
}
