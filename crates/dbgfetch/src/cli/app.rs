use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "dbgfetch", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Draw a download progress bar.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Server list, overriding DEBUGINFOD_URLS.
    #[arg(long, value_name = "URLS", global = true)]
    pub urls: Option<String>,

    /// Cache directory, overriding DEBUGINFOD_CACHE_PATH.
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Per-server header and chunk timeout in seconds, overriding DEBUGINFOD_TIMEOUT.
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "d", name = "debuginfo", about = "Fetch the debug info file for a build-id")]
    DebugInfo(IdArg),
    #[command(alias = "e", name = "executable", about = "Fetch the executable for a build-id")]
    Executable(IdArg),
    #[command(alias = "s", name = "source", about = "Fetch one source file for a build-id")]
    Source(SourceArg),
    #[command(name = "clean", about = "Remove cache entries unused for a while")]
    Clean(CleanArg),
}

#[derive(Clone, Debug, Args)]
pub struct IdArg {
    /// Build-id in hex.
    pub build_id: String,
}

#[derive(Clone, Debug, Args)]
pub struct SourceArg {
    pub build_id: String,
    /// Source path as recorded in the debug info.
    pub filename: String,
}

#[derive(Clone, Debug, Args)]
pub struct CleanArg {
    /// Remove entries not used for this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 7 * 24 * 3600)]
    pub max_unused_age: u64,
}
