//! The per-tick broadcast frame (§4.5, §6) and its wire grammar, shared by
//! the coordinator (building frames) and the editor replica (parsing them).

use crate::document::EditRecord;
use crate::status::EditStatus;

/// The change set produced by one committed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The version the tick was applied at, i.e. before the increment.
    pub version: u64,
    pub records: Vec<EditRecord>,
}

impl Frame {
    pub fn new(version: u64, records: Vec<EditRecord>) -> Self {
        Self { version, records }
    }

    /// Renders the frame as the exact lines to write to a session, in order:
    /// `VERSION v`, one `EDIT ...` per record, `END`.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.records.len() + 2);
        lines.push(format!("VERSION {}", self.version));
        lines.extend(self.records.iter().map(EditRecord::to_line));
        lines.push("END".to_string());
        lines
    }
}

/// One line of a broadcast frame, as parsed by an editor replica (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameLine {
    Version(u64),
    Edit {
        username: String,
        raw_cmd: String,
        status: EditStatus,
    },
    End,
}

impl FrameLine {
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(v) = line.strip_prefix("VERSION ") {
            return Some(Self::Version(v.trim().parse().ok()?));
        }
        if line == "END" {
            return Some(Self::End);
        }
        let rest = line.strip_prefix("EDIT ")?;
        let mut parts = rest.splitn(2, ' ');
        let username = parts.next()?.to_string();
        let rest = parts.next()?;
        // `status` is the trailing `SUCCESS` or `Reject <REASON>`; everything
        // before it is the raw command text, which may itself contain spaces.
        if let Some(raw_cmd) = rest.strip_suffix(" SUCCESS") {
            return Some(Self::Edit {
                username,
                raw_cmd: raw_cmd.to_string(),
                status: EditStatus::Success,
            });
        }
        let (raw_cmd, reason) = rest.rsplit_once(" Reject ")?;
        Some(Self::Edit {
            username,
            raw_cmd: raw_cmd.to_string(),
            status: EditStatus::parse(reason)?,
        })
    }
}
