//! Application configuration constants.
//! Tuning and names in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    writer_thread_name: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                writer_thread_name: format!("{pkg}-writer"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Per-directory settings file, e.g. `.treesum.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    pub fn writer_thread_name(&self) -> &str {
        &self.writer_thread_name
    }
}

// ---- Hashing ----

/// Hashing buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// Bytes read per chunk (one `ProgressUpdate` per chunk). 64 KB.
    pub const READ_CHUNK_SIZE: usize = 64 * 1024;
}

// ---- Tree building ----

/// Extension (lowercase, with dot) that marks a Windows shell link.
pub const SHORTCUT_EXTENSION: &str = ".lnk";

// ---- Progress ----

/// Progress bar settings.
pub struct ProgressConsts;

impl ProgressConsts {
    pub const DESC: &'static str = "Hashing";
    pub const UNIT: &'static str = "B";
}
