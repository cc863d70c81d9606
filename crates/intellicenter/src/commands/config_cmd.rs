//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let optional = [
            ("port", p.port.map(u64::from)),
            ("timeout", p.timeout),
            ("keepalive_interval", p.keepalive_interval),
            ("idle_timeout", p.idle_timeout),
            ("flow_stall_timeout", p.flow_stall_timeout),
            ("reconnect_delay", p.reconnect_delay),
            ("reconnect_max_delay", p.reconnect_max_delay),
            ("disconnect_debounce", p.disconnect_debounce),
        ];
        for (key, value) in optional.iter().filter_map(|(k, v)| v.map(|v| (k, v))) {
            let _ = writeln!(out, "{key} = {value}");
        }
    }

    out
}

fn init(args: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config()?;
    if cfg.profiles.contains_key(&args.name) && !args.force {
        return Err(CliError::ProfileExists { name: args.name });
    }

    let profile = Profile {
        port: args.port,
        ..Profile::new(args.host)
    };
    // Fail now rather than on first use.
    config::profile_to_controller_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(args.name.clone(), profile);
    if args.make_default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(args.name.clone());
    }
    let path = config::save_config(&cfg)?;

    if !global.quiet {
        eprintln!("Profile '{}' written to {}", args.name, path.display());
    }
    Ok(())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(global.output, &cfg, format_config, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            })?;
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init_args) => init(init_args, global),

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref();
            let out = cfg
                .profiles
                .iter()
                .map(|(name, p)| {
                    let marker = if Some(name.as_str()) == default { "*" } else { " " };
                    format!("{marker} {name}\t{}", p.host)
                })
                .collect::<Vec<_>>()
                .join("\n");
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
