//! The coordinator-side command log (§3, §5): an append-only audit trail of
//! every mutating command the coordinator actually executed, grouped by the
//! version it committed at. Distinct from `Document::history` (which also
//! carries rejections) and from the editor-local `LOG?` log (§10.4), which
//! records what a single editor process submitted, not what the coordinator
//! accepted.

use std::sync::Mutex;

use crate::document::EditRecord;

/// One version's worth of accepted mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedTick {
    pub version: u64,
    pub records: Vec<EditRecord>,
}

/// Guarded by its own mutex (§5 lock order: ... Q → log, last in the chain),
/// so appending to it never needs to be done while holding the document or
/// session table lock.
#[derive(Debug, Default)]
pub struct CommandLog {
    ticks: Mutex<Vec<LoggedTick>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the accepted subset of one tick's records, if any. Rejections
    /// never reach the log: it's an audit trail of what actually mutated the
    /// document, not of what was attempted.
    pub fn record_tick(&self, version: u64, records: &[EditRecord]) {
        let accepted: Vec<EditRecord> = records.iter().filter(|r| r.status.is_success()).cloned().collect();
        if accepted.is_empty() {
            return;
        }
        self.ticks
            .lock()
            .expect("command log mutex poisoned")
            .push(LoggedTick {
                version,
                records: accepted,
            });
    }

    /// Every logged tick in commit order, oldest first.
    pub fn ticks(&self) -> Vec<LoggedTick> {
        self.ticks.lock().expect("command log mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::EditStatus;

    fn record(username: &str, status: EditStatus) -> EditRecord {
        EditRecord {
            username: username.to_string(),
            raw_cmd: "INSERT 0 hi".to_string(),
            submitted_version: 0,
            status,
        }
    }

    #[test]
    fn only_accepted_records_are_logged() {
        let log = CommandLog::new();
        log.record_tick(
            0,
            &[
                record("alice", EditStatus::Success),
                record("mallory", EditStatus::Unauthorized),
            ],
        );
        let ticks = log.ticks();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].version, 0);
        assert_eq!(ticks[0].records.len(), 1);
        assert_eq!(ticks[0].records[0].username, "alice");
    }

    #[test]
    fn a_tick_with_no_accepted_records_is_not_logged() {
        let log = CommandLog::new();
        log.record_tick(0, &[record("mallory", EditStatus::Unauthorized)]);
        assert!(log.ticks().is_empty());
    }
}
