use std::path::PathBuf;

use clap::{Parser, Subcommand};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("SIGCLIP_", $v)
    };
}

/// Manifest-driven downloader and cutter for building sign-language clip
/// datasets. Download, cut, and verify video segments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Print debug logs
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Process every row of a clip manifest
    Run(RunArgs),

    /// Download one URL and cut explicit time segments out of it
    Cut(CutArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// The CSV manifest of clips to produce
    #[clap(env = arg_env!("MANIFEST"))]
    pub manifest: PathBuf,

    /// The path to the output directory
    #[clap(long, env = arg_env!("OUT"))]
    pub out: PathBuf,

    /// The path to the append-only audit log
    #[clap(long, env = arg_env!("LOG"))]
    pub log: PathBuf,

    /// Number of parallel row workers
    #[clap(long, default_value_t = default_jobs(), env = arg_env!("JOBS"))]
    pub jobs: usize,

    /// Process only a random subset of this many rows
    #[clap(long, env = arg_env!("SAMPLE"))]
    pub sample: Option<usize>,

    #[clap(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(clap::Args, Debug)]
pub struct CutArgs {
    /// The URL of the source video
    pub url: String,

    /// A `START-END` segment to cut, repeatable.
    /// Times are `H:MM:SS[.ms]`, `M:SS[.ms]` or plain seconds.
    #[clap(long = "segment", required = true)]
    pub segments: Vec<String>,

    /// The output directory
    #[clap(long, env = arg_env!("OUT"))]
    pub out: PathBuf,

    /// Base name of the produced segment files
    #[clap(long)]
    pub stem: String,

    #[clap(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(clap::Args, Debug)]
pub struct TimeoutArgs {
    /// Deadline in seconds for one external tool invocation
    #[clap(long, default_value_t = 600, env = arg_env!("TOOL_TIMEOUT"))]
    pub tool_timeout: u64,

    /// Read deadline in seconds for the direct HTTP fallback
    #[clap(long, default_value_t = 200, env = arg_env!("HTTP_TIMEOUT"))]
    pub http_timeout: u64,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
