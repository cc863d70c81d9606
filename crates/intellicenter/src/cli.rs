//! Clap derive structures for the `intellicenter` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// intellicenter -- talk to a Pentair IntelliCenter from the command line
#[derive(Debug, Parser)]
#[command(
    name = "intellicenter",
    version,
    about = "Inspect and control a Pentair IntelliCenter pool controller",
    long_about = "Connects to an IntelliCenter appliance over its local JSON protocol\n\
        (TCP port 6681), loads the object model, and reads or changes\n\
        circuits, bodies, pumps and other equipment.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Appliance profile to use
    #[arg(long, short = 'p', env = "INTELLICENTER_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Appliance host or IP (overrides profile)
    #[arg(long, short = 'H', env = "INTELLICENTER_HOST", global = true)]
    pub host: Option<String>,

    /// Appliance TCP port (overrides profile)
    #[arg(long, env = "INTELLICENTER_PORT", global = true)]
    pub port: Option<u16>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "INTELLICENTER_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Connect timeout in seconds (overrides profile)
    #[arg(long, env = "INTELLICENTER_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the appliance's system information
    Info,

    /// List tracked objects
    #[command(alias = "ls")]
    Objects(ObjectsArgs),

    /// Show every attribute of one object
    Get(GetArgs),

    /// Change attributes of one object
    Set(SetArgs),

    /// Stay connected and print changes as the appliance reports them
    Watch(WatchArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),
}

// ── Objects ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ObjectsArgs {
    /// Only objects of this type (e.g. CIRCUIT, BODY, PUMP)
    #[arg(long = "type", short = 't')]
    pub objtype: Option<String>,

    /// Only circuits that drive a light
    #[arg(long)]
    pub lights: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Object name, e.g. CIRC01
    pub objnam: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Object name, e.g. CIRC01
    pub objnam: String,

    /// Changes as KEY=VALUE, e.g. STATUS=ON
    #[arg(required = true, value_name = "KEY=VALUE")]
    pub changes: Vec<String>,

    /// Return once the request is written instead of waiting for the reply
    #[arg(long)]
    pub no_wait: bool,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only report changes to objects of this type
    #[arg(long = "type", short = 't')]
    pub objtype: Option<String>,

    /// Keep reconnecting when the appliance goes away
    #[arg(long)]
    pub reconnect: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Create or update a profile
    Init(InitArgs),

    /// List profile names
    Profiles,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Appliance host or IP
    #[arg(long)]
    pub host: String,

    /// Appliance TCP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Profile name to write
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Make this the default profile
    #[arg(long)]
    pub make_default: bool,

    /// Overwrite an existing profile of the same name
    #[arg(long)]
    pub force: bool,
}
