//! The per-command outcomes a coordinator can record and broadcast (§7).

use std::fmt;

/// The outcome of applying one edit command against the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Success,
    InvalidPosition,
    /// Reserved for range edits whose target was removed earlier in the same
    /// tick; this implementation never produces it, matching the reference.
    DeletedPosition,
    OutdatedVersion,
    Unauthorized,
}

impl EditStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// The exact token used on the wire after `Reject `, or `SUCCESS` on its own.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::InvalidPosition => "INVALID_POSITION",
            Self::DeletedPosition => "DELETED_POSITION",
            Self::OutdatedVersion => "OUTDATED_VERSION",
            Self::Unauthorized => "UNAUTHORISED",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "SUCCESS" => Self::Success,
            "INVALID_POSITION" => Self::InvalidPosition,
            "DELETED_POSITION" => Self::DeletedPosition,
            "OUTDATED_VERSION" => Self::OutdatedVersion,
            "UNAUTHORISED" => Self::Unauthorized,
            _ => return None,
        })
    }
}

impl fmt::Display for EditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "SUCCESS")
        } else {
            write!(f, "Reject {}", self.reason())
        }
    }
}

impl From<crate::piece::OutOfRange> for EditStatus {
    fn from(_: crate::piece::OutOfRange) -> Self {
        Self::InvalidPosition
    }
}

/// A line from the intake or broadcast protocol didn't match any known command
/// grammar. Per §7 this is dropped silently rather than surfaced as a reject
/// record, since there's no authenticated sender to attribute it to.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unrecognized command: {0:?}")]
pub struct ParseCommandError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_grammar() {
        assert_eq!(EditStatus::Success.to_string(), "SUCCESS");
        assert_eq!(
            EditStatus::InvalidPosition.to_string(),
            "Reject INVALID_POSITION"
        );
        assert_eq!(EditStatus::Unauthorized.to_string(), "Reject UNAUTHORISED");
    }

    #[test]
    fn reason_round_trips_through_parse() {
        for status in [
            EditStatus::Success,
            EditStatus::InvalidPosition,
            EditStatus::DeletedPosition,
            EditStatus::OutdatedVersion,
            EditStatus::Unauthorized,
        ] {
            assert_eq!(EditStatus::parse(status.reason()), Some(status));
        }
    }
}
