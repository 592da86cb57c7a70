//! Command dispatch: bridges CLI args -> session operations -> output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod selections;
pub mod update;
pub mod util;
pub mod watch;

use loadout_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(session, &args, global).await,
        Command::Catalog(args) => catalog::handle(session, &args, global).await,
        Command::Select(args) => selections::select(session, &args, global).await,
        Command::Selections(args) => selections::handle(session, &args, global).await,
        Command::Update(args) => update::handle(session, &args, global).await,
        // Config and Completions are handled before a session exists
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not run against a session".into(),
        }),
    }
}
