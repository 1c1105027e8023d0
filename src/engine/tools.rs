//! Path utilities

use std::io;
use std::path::{Component, Path, PathBuf};

/// Convert absolute path to relative path from base (only when `path` is under `base`).
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Relative path from `base` to `path`, stepping out with `..` when `path` is not under `base`.
/// Both are expected absolute and lexically normalized.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    if let Some(rel) = path_relative_to(path, base) {
        return rel;
    }
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();
    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &path_parts[common..] {
        rel.push(part.as_os_str());
    }
    rel
}

/// Drop `.` components and fold `..` into the preceding component, without touching the disk.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Report/portable form of a relative path: `/` separators on every platform.
pub fn path_to_report_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Absolute target of a link. Relative targets start from the link's real directory, and each
/// `..` steps out of the real (symlink-resolved) directory reached so far, as the OS does.
/// Paths that do not exist fall back to lexical folding.
pub fn resolve_link_target(link: &Path, target: &Path) -> PathBuf {
    let mut resolved = if target.is_absolute() {
        PathBuf::new()
    } else {
        let parent = link.parent().unwrap_or(Path::new(""));
        parent
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(parent))
    };
    for component in target.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Ok(real) = resolved.canonicalize() {
                    resolved = real;
                }
                if !resolved.pop() && !resolved.has_root() {
                    resolved.push("..");
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Where a link itself lives: canonical parent directory + its own file name. Unlike
/// `canonicalize(link)` this does not follow the link, so it works for dangling and looping links.
pub fn link_identity(link: &Path) -> io::Result<PathBuf> {
    let name = link
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "link has no file name"))?;
    let parent = match link.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.canonicalize()?,
        _ => std::env::current_dir()?,
    };
    Ok(parent.join(name))
}
