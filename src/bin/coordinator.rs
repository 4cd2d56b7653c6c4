//! The coordinator binary (§6): `coordinator <interval_ms>`.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use parchment::cli::CoordinatorArgs;
use parchment::coordinator::{self, Coordinator};
use parchment::roles::RoleTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CoordinatorArgs::parse();
    parchment::logging::initialize(args.debug);

    if args.interval_ms == 0 {
        anyhow::bail!("interval_ms must be a positive integer");
    }

    let roles = RoleTable::load(&args.roles).context("loading role table")?;
    let coordinator = Coordinator::new(roles, args.max_sessions);
    let socket_path = coordinator::socket_path(std::process::id());

    coordinator
        .run(
            &socket_path,
            Duration::from_millis(args.interval_ms),
            &args.persist_to,
        )
        .await
}
