pub mod config;
pub mod logger;
pub mod treesum_toml;

pub use config::*;
pub use logger::setup_logging;
pub use treesum_toml::{apply_file_to_opts, load_treesum_toml};
