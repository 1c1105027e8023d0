//! Load `.treesum.toml` from a directory (CLI only). Lib callers pass [`Opts`] directly.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Opts;
use crate::engine::hashing::Algorithm;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct TreesumToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    algorithm: Option<String>,
    output: Option<String>,
    progress: Option<bool>,
    verbose: Option<bool>,
    chunk_size: Option<usize>,
}

/// Load `.treesum.toml` from `dir`. `Ok(None)` when there is no such file; an unreadable or
/// malformed file is an error for the caller to report.
pub fn load_treesum_toml(dir: &Path) -> anyhow::Result<Option<TreesumToml>> {
    let path = dir.join(PackagePaths::get().config_filename());
    if !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("read {}", path.display()))?;
    let file = parse_treesum_toml(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(file))
}

pub fn parse_treesum_toml(s: &str) -> Result<TreesumToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// Returns one message per setting that was present but ignored.
pub fn apply_file_to_opts(file: &TreesumToml, opts: &mut Opts) -> Vec<String> {
    let s = &file.settings;
    let mut ignored = Vec::new();
    if let Some(ref name) = s.algorithm {
        match Algorithm::from_str(name) {
            Ok(a) => opts.algorithm = a,
            Err(e) => ignored.push(format!("ignoring config algorithm: {}", e)),
        }
    }
    if let Some(ref p) = s.output {
        opts.output = Some(PathBuf::from(p));
    }
    apply_file_opt!(s, opts, progress);
    apply_file_opt!(s, opts, verbose);
    match s.chunk_size {
        Some(0) => ignored.push("ignoring config chunk_size: must be at least 1".to_string()),
        Some(n) => opts.chunk_size = n,
        None => {}
    }
    ignored
}
