//! Command dispatch: bridges CLI args -> engine/client -> output formatting.

pub mod config_cmd;
pub mod snapshot;
pub mod watch;

use fleetsync_api::FleetClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Settings;
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    settings: Settings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client = FleetClient::new(settings.base_url.clone(), &settings.transport)?;
    match cmd {
        Command::Watch(args) => watch::handle(client, settings, args, global).await,
        Command::Snapshot => snapshot::handle(&client, global).await,
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    }
}
