use clap::Parser;
use std::path::PathBuf;

use crate::engine::hashing::Algorithm;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Checksum every file under a directory.
#[derive(Clone, Parser)]
#[command(name = "treesum")]
#[command(about = "Write one \"<digest> <path>\" line per file under DIR (symlinks and .lnk shortcuts followed).")]
pub struct Cli {
    /// Directory (or single file) to hash. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Digest algorithm: md5 (default), sha256, blake3.
    #[arg(long, short = 'a')]
    pub algorithm: Option<Algorithm>,

    /// Write the report here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Show a byte progress bar on stderr.
    #[arg(long, short = 'p', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub progress: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Read chunk size in bytes (also the progress granularity).
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub chunk_size: Option<usize>,
}
