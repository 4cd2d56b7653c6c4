//! The intake queue (§4.3): every accepted command line waits here until the
//! scheduler's next tick drains it.

use std::time::Instant;

/// One command line as it arrived, before role-checking or application.
#[derive(Debug, Clone)]
pub struct IntakeEntry {
    pub username: String,
    pub raw_cmd: String,
    pub submitted_version: u64,
    arrived_at: Instant,
}

impl IntakeEntry {
    pub fn new(username: impl Into<String>, raw_cmd: impl Into<String>, submitted_version: u64) -> Self {
        Self {
            username: username.into(),
            raw_cmd: raw_cmd.into(),
            submitted_version,
            arrived_at: Instant::now(),
        }
    }
}

/// A plain FIFO buffer shared behind a mutex by every session task and the
/// scheduler. Draining is atomic: a tick sees exactly the entries pushed
/// before it started draining, never a partial view.
#[derive(Debug, Default)]
pub struct Queue {
    entries: Vec<IntakeEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: IntakeEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every queued entry, stable-sorted by arrival time
    /// so commands that raced to be pushed still apply in the order they
    /// actually arrived.
    pub fn drain_sorted(&mut self) -> Vec<IntakeEntry> {
        let mut batch = std::mem::take(&mut self.entries);
        batch.sort_by_key(|entry| entry.arrived_at);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_queue() {
        let mut q = Queue::new();
        q.push(IntakeEntry::new("alice", "INSERT 0 hi", 0));
        assert_eq!(q.len(), 1);
        let batch = q.drain_sorted();
        assert_eq!(batch.len(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_preserves_arrival_order() {
        let mut q = Queue::new();
        q.push(IntakeEntry::new("alice", "INSERT 0 a", 0));
        q.push(IntakeEntry::new("bob", "INSERT 0 b", 0));
        q.push(IntakeEntry::new("alice", "INSERT 1 c", 0));
        let batch = q.drain_sorted();
        let users: Vec<_> = batch.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(users, ["alice", "bob", "alice"]);
    }
}
