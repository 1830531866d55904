//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resumable bulk download of a remote directory tree over FTP or SCP.
///
/// A new run lists everything under the URL's path, writes a
/// `<timestamp>.dljob` file, and downloads with a pool of workers. Pass
/// `--job <file>` to resume an interrupted run.
#[derive(Parser, Debug)]
#[command(name = "dljob")]
#[command(author, version, about)]
pub struct Args {
    /// Source URL: ftp://[user[:password]@]host[:port]/path or scp://user@host[:port]/path
    #[arg(long, required_unless_present = "job")]
    pub url: Option<String>,

    /// Local directory that mirrors the remote tree
    #[arg(long, required_unless_present = "job")]
    pub target_dir: Option<PathBuf>,

    /// Resume from an existing job file
    #[arg(long, conflicts_with_all = ["url", "target_dir"])]
    pub job: Option<PathBuf>,

    /// Number of concurrent workers, each with its own connection (1-64)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub threads: Option<u8>,

    /// Start downloading without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Apply the remote file mode to downloaded files (scp only)
    #[arg(long)]
    pub preserve_mode: bool,

    /// Seconds between job-file autosaves
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub autosave_secs: Option<u64>,

    /// Seconds allowed for establishing each connection
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout_secs: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
