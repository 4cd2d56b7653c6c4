//! The authoritative document (§3, §4.2): piece list, version counter, and
//! the edit history needed to answer a `LOG?` request.

use crate::commands::{apply_command, Command};
use crate::piece::{OutOfRange, PieceList};
use crate::status::EditStatus;

/// One edit as it was submitted and resolved, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub username: String,
    pub raw_cmd: String,
    pub submitted_version: u64,
    pub status: EditStatus,
}

impl EditRecord {
    /// This record's contribution to a `VERSION`/`EDIT` broadcast frame (§6):
    /// `EDIT <user> <raw_cmd> SUCCESS` or `EDIT <user> <raw_cmd> Reject <REASON>`.
    pub fn to_line(&self) -> String {
        format!("EDIT {} {} {}", self.username, self.raw_cmd, self.status)
    }
}

/// The live document: current text, version counter, and every edit applied
/// or rejected against it so far, split into the batch still in progress
/// (`pending`) and everything already closed out (`history`).
#[derive(Debug)]
pub struct Document {
    piece_list: PieceList,
    version: u64,
    pending: Vec<EditRecord>,
    history: Vec<EditRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            piece_list: PieceList::new(),
            version: 0,
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Seeds a document from persisted text, as at coordinator startup.
    pub fn from_text(text: &str) -> Result<Self, OutOfRange> {
        let mut doc = Self::new();
        if !text.is_empty() {
            doc.piece_list.insert(0, text)?;
        }
        Ok(doc)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> String {
        self.piece_list.flatten()
    }

    pub fn history(&self) -> &[EditRecord] {
        &self.history
    }

    pub fn pending(&self) -> &[EditRecord] {
        &self.pending
    }

    /// Applies one already-authorized command submitted against
    /// `submitted_version`, recording its outcome in `pending`. A stale
    /// version or an out-of-range position both leave the piece list
    /// untouched but still produce a record; only `Success` mutates it.
    ///
    /// Returns `None` for a command whose text doesn't match any known
    /// grammar: per §7 a parse failure is dropped silently rather than
    /// recorded, so no `EditRecord` is pushed and the caller must not treat
    /// this tick as having produced one.
    pub fn apply(&mut self, username: &str, raw_cmd: &str, submitted_version: u64) -> Option<EditStatus> {
        let status = if submitted_version != self.version {
            EditStatus::OutdatedVersion
        } else {
            let cmd = Command::parse(raw_cmd).ok()?;
            match apply_command(&mut self.piece_list, &cmd) {
                Ok(()) => EditStatus::Success,
                Err(status) => status,
            }
        };
        self.pending.push(EditRecord {
            username: username.to_string(),
            raw_cmd: raw_cmd.to_string(),
            submitted_version,
            status,
        });
        Some(status)
    }

    /// Records a rejection decided before the command ever reached the
    /// document, such as an unauthorized submitter (§4.2): no version check,
    /// no parse, no mutation.
    pub fn reject(&mut self, username: &str, raw_cmd: &str, submitted_version: u64, status: EditStatus) {
        debug_assert!(!status.is_success());
        self.pending.push(EditRecord {
            username: username.to_string(),
            raw_cmd: raw_cmd.to_string(),
            submitted_version,
            status,
        });
    }

    /// Ends the current tick: advances the version and folds this tick's
    /// records into history. Returns the batch, ready for the scheduler to
    /// build a broadcast frame from.
    pub fn close_tick(&mut self) -> Vec<EditRecord> {
        self.version += 1;
        let batch = std::mem::take(&mut self.pending);
        self.history.extend(batch.iter().cloned());
        batch
    }
}
