//! Command dispatch: bridges CLI args -> controller calls -> output formatting.

pub mod config_cmd;
pub mod objects;
pub mod set;
pub mod system;
pub mod watch;

use std::time::Duration;

use intellicenter_core::{Controller, ControllerConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Extra time allowed for loading the model once the socket is open.
const BOOTSTRAP_GRACE: Duration = Duration::from_secs(30);

/// Dispatch a one-shot command: connect, run the handler, disconnect.
pub async fn dispatch(cmd: Command, config: ControllerConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let controller = connect(config).await?;

    let result = match cmd {
        Command::Info => system::handle(&controller, global),
        Command::Objects(args) => objects::list(&controller, &args, global),
        Command::Get(args) => objects::get(&controller, &args, global),
        Command::Set(args) => set::handle(&controller, args, global).await,
        // Watch and Config are handled before dispatch
        Command::Watch(_) | Command::Config(_) => Err(CliError::Internal("command not dispatchable".into())),
    };

    controller.stop().await;
    result
}

/// Start a controller, bounding the whole bootstrap.
pub(crate) async fn connect(config: ControllerConfig) -> Result<Controller, CliError> {
    let limit = config.connect_timeout + BOOTSTRAP_GRACE;
    let controller = Controller::new(config);

    match tokio::time::timeout(limit, controller.start()).await {
        Ok(result) => result?,
        Err(_) => {
            controller.stop().await;
            return Err(CliError::Timeout {
                seconds: limit.as_secs(),
            });
        }
    }
    Ok(controller)
}
