//! System info handler.

use intellicenter_core::{Controller, SystemInfo};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(info: &SystemInfo) -> String {
    output::key_values([
        ("Name", info.prop_name.clone()),
        ("System", info.sname.clone()),
        ("Object", info.objnam.clone()),
        ("Version", info.sw_version.clone()),
        ("Units", if info.uses_metric { "metric" } else { "imperial" }.into()),
        ("Unique ID", info.unique_id.clone()),
    ])
}

pub fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let info = controller.system_info().ok_or_else(|| CliError::Protocol {
        message: "appliance reported no system object".into(),
    })?;
    let out = output::render_single(global.output, &info, detail, |i| i.unique_id.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
