//! Document persistence on clean shutdown (§10.6). Deliberately thin: a
//! single best-effort write, no atomic rename, no durability guarantee.
//! Durability across crashes is explicitly out of scope (§1).

use std::path::Path;

use anyhow::Context;

pub fn save(path: &Path, body: &str) -> anyhow::Result<()> {
    std::fs::write(path, body).with_context(|| format!("persisting document to {}", path.display()))
}
