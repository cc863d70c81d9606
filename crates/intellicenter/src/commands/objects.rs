//! Object listing and detail handlers.

use intellicenter_core::{Controller, PoolObject};
use tabled::Tabled;

use crate::cli::{GetArgs, GlobalOpts, ObjectsArgs};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Object")]
    objnam: String,
    #[tabled(rename = "Type")]
    objtype: String,
    #[tabled(rename = "Subtype")]
    subtype: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&PoolObject> for ObjectRow {
    fn from(o: &PoolObject) -> Self {
        Self {
            objnam: o.objnam().to_owned(),
            objtype: o.objtype().to_owned(),
            subtype: o.subtype().unwrap_or("-").to_owned(),
            name: o.sname().unwrap_or_default().to_owned(),
            status: o.status().unwrap_or("-").to_owned(),
        }
    }
}

fn detail(o: &PoolObject) -> String {
    let mut pairs = vec![("OBJTYP", o.objtype().to_owned())];
    if let Some(subtype) = o.subtype() {
        pairs.push(("SUBTYP", subtype.to_owned()));
    }
    pairs.extend(o.attributes().iter().map(|(k, v)| (k.as_str(), v.clone())));
    format!("{}\n{}", o.objnam(), output::key_values(pairs))
}

// ── Handlers ────────────────────────────────────────────────────────

pub fn list(controller: &Controller, args: &ObjectsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let model = controller.model();
    let wanted = args.objtype.as_deref().map(str::to_ascii_uppercase);
    let objects: Vec<&PoolObject> = model
        .objects()
        .filter(|o| wanted.as_deref().is_none_or(|t| o.objtype() == t))
        .filter(|o| !args.lights || o.is_a_light())
        .collect();

    let out = output::render_list(
        global.output,
        &objects,
        |o| ObjectRow::from(*o),
        |o| o.objnam().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn get(controller: &Controller, args: &GetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let model = controller.model();
    let object = model.get(&args.objnam).ok_or_else(|| CliError::NotFound {
        objnam: args.objnam.clone(),
    })?;

    let out = output::render_single(global.output, object, detail, |o| {
        o.attributes()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
