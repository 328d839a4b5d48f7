//! CLI argument parsing for `rbench`.
//!
//! The CLI is thin: each subcommand maps to one session operation so the
//! same library calls can back another front end.
use crate::bridge::BackendChoice;
use crate::catalog::ResolutionClass;
use crate::protocol::AdfrMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "rbench",
    version,
    about = "Refresh-rate mode and DTBO workspace control for the display module",
    after_help = "Examples:\n  rbench status\n  rbench modes --class high\n  rbench set-global 2\n  rbench apps --search game\n  rbench set-app com.example.game 5\n  rbench workspace scan\n  rbench workspace add 144 --base dsi_panel_120\n  rbench workspace apply",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Settings file (default: <config dir>/rbench/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Executor backend
    #[arg(long, global = true, value_enum, default_value_t = BackendChoice::Auto)]
    pub backend: BackendChoice,

    /// Answer yes to every confirmation
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Emit machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Log progress to stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show slot, current refresh rate, model and DTBO backup state
    Status,
    /// List display modes and the active global mode
    Modes(ModesArgs),
    /// Set the global display mode
    SetGlobal(SetGlobalArgs),
    /// List third-party apps with labels and per-app modes
    Apps(AppsArgs),
    /// Set (or reset with -1) the display mode of one app
    SetApp(SetAppArgs),
    /// Show or clear the module daemon log
    Logs(LogsArgs),
    /// Flash the overclocked DTBO
    Flash(FlashArgs),
    /// Restore the stock DTBO from backup
    Restore,
    /// Edit refresh-rate nodes in the DTBO workspace
    #[command(subcommand)]
    Workspace(WorkspaceCommand),
    /// Uninstall the module
    Uninstall,
    /// Toggle adaptive refresh (ADFR)
    Adfr(AdfrArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClassFilter {
    Standard,
    High,
    All,
}

impl ClassFilter {
    pub fn class(self) -> Option<ResolutionClass> {
        match self {
            ClassFilter::Standard => Some(ResolutionClass::Standard),
            ClassFilter::High => Some(ResolutionClass::High),
            ClassFilter::All => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct ModesArgs {
    /// Resolution class to show (default: class of the active mode)
    #[arg(long, value_enum)]
    pub class: Option<ClassFilter>,
}

#[derive(Args, Debug)]
pub struct SetGlobalArgs {
    /// Mode id from `rbench modes`
    #[arg(allow_negative_numbers = true)]
    pub mode_id: i64,
}

#[derive(Args, Debug)]
pub struct AppsArgs {
    /// Filter by package name, label, or override refresh rate
    #[arg(long, short = 's', value_name = "TERM")]
    pub search: Option<String>,

    /// Skip label resolution
    #[arg(long)]
    pub no_labels: bool,
}

#[derive(Args, Debug)]
pub struct SetAppArgs {
    /// Package name
    pub package: String,

    /// Mode id, or -1 to follow the global mode
    #[arg(allow_negative_numbers = true)]
    pub mode_id: i64,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Clear the log instead of showing it
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args, Debug)]
pub struct FlashArgs {
    /// Experimental custom refresh rate in Hz
    #[arg(long, value_name = "HZ")]
    pub rate: Option<String>,
}

#[derive(Args, Debug)]
pub struct AdfrArgs {
    #[arg(value_enum)]
    pub mode: AdfrMode,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Scan refresh-rate nodes
    Scan,
    /// Re-extract the DTBO, discarding workspace edits
    Reextract,
    /// Generate high refresh-rate nodes for this model
    Auto,
    /// Add a node cloned from a base node
    Add(AddArgs),
    /// Change the refresh rate of a node (add new, then remove old)
    Modify(ModifyArgs),
    /// Remove a node
    Remove(RemoveArgs),
    /// Repack and flash the workspace
    Apply,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Target refresh rate in Hz
    pub fps: String,

    /// Base node (default: the 120 Hz node, else the first one)
    #[arg(long, value_name = "NODE")]
    pub base: Option<String>,
}

#[derive(Args, Debug)]
pub struct ModifyArgs {
    /// Node to change
    pub node: String,

    /// New refresh rate in Hz
    pub fps: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Node to remove
    pub node: String,
}
