//! A multi-user collaborative Markdown editor: a batching coordinator and
//! many editor clients converging on a shared document through versioned,
//! per-tick broadcast frames.

pub mod broadcast;
pub mod cmdlog;
pub mod commands;
pub mod coordinator;
pub mod document;
pub mod logging;
pub mod persistence;
pub mod piece;
pub mod queue;
pub mod replica;
pub mod roles;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod status;

#[cfg(feature = "executable-deps")]
pub mod cli;
