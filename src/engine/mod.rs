//! Engine module: CLI plumbing, checksum calculators, progress display, path tools

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use hashing::{Algorithm, ChecksumCalculator, DigestCalculator};
pub use progress::ProgressReporter;
pub use tools::{
    link_identity, normalize_lexically, path_relative_to, path_to_report_string, relative_path,
    resolve_link_target,
};
