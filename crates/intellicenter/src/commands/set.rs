//! Attribute change handler.

use intellicenter_core::Controller;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

/// Split `KEY=VALUE` arguments. Keys are upper-cased; values are sent
/// verbatim.
pub fn parse_changes(raw: &[String]) -> Result<Vec<(String, String)>, CliError> {
    raw.iter()
        .map(|arg| match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_ascii_uppercase(), value.to_owned())),
            _ => Err(CliError::Validation {
                field: "changes".into(),
                reason: format!("expected KEY=VALUE, got '{arg}'"),
            }),
        })
        .collect()
}

/// Status line for a change. Without waiting, nothing is known beyond
/// the request having been queued.
fn outcome(objnam: &str, no_wait: bool) -> String {
    if no_wait {
        format!("Change to {objnam} sent")
    } else {
        format!("Change to {objnam} accepted")
    }
}

pub async fn handle(controller: &Controller, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !controller.model().contains(&args.objnam) {
        return Err(CliError::NotFound { objnam: args.objnam });
    }

    let changes = parse_changes(&args.changes)?;
    let pairs: Vec<(&str, &str)> = changes.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    if args.no_wait {
        let id = controller.request_changes(&args.objnam, &pairs)?;
        tracing::debug!(message_id = %id, "change sent");
    } else {
        controller.request_changes_and_wait(&args.objnam, &pairs).await?;
    }

    if !global.quiet {
        eprintln!("{}", outcome(&args.objnam, args.no_wait));
    }
    Ok(())
}
