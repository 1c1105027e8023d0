//! Recursive filesystem walk that produces a [`FileNode`] tree.

use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::tools::{
    link_identity, normalize_lexically, path_to_report_string, relative_path,
    resolve_link_target,
};
use crate::error::BuildError;
use crate::tree::shortcut::{LnkResolver, ShortcutResolver, is_shortcut};
use crate::{Directory, FileNode, RegularFile};

/// Builds a [`FileNode`] from a real path.
///
/// Symbolic links and `.lnk` shortcuts are followed to their targets. A path that is already on
/// the chain currently being resolved (an ancestor directory, or a link met again through its
/// own targets) fails the build with [`BuildError::CycleDetected`]. The same file reached twice
/// through unrelated links is fine.
pub struct TreeBuilder {
    shortcuts: Box<dyn ShortcutResolver>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::with_resolver(Box::new(LnkResolver))
    }

    pub fn with_resolver(shortcuts: Box<dyn ShortcutResolver>) -> Self {
        Self { shortcuts }
    }

    /// Build the tree rooted at `root`. Recorded paths are relative to `root`'s parent.
    /// Any read failure or cycle aborts the whole build; no partial tree is returned.
    pub fn build(&self, root: &Path) -> Result<FileNode, BuildError> {
        let abs = std::path::absolute(root).map_err(|e| BuildError::io(root, e))?;
        let abs = normalize_lexically(&abs);
        // Link targets come back with real parents, so report paths are taken from the real
        // parent of the root as well.
        let (abs, base) = match (abs.parent(), abs.file_name()) {
            (Some(parent), Some(name)) => {
                let base = parent.canonicalize().map_err(|e| BuildError::io(parent, e))?;
                (base.join(name), base)
            }
            _ => (abs.clone(), abs.clone()),
        };
        debug!("building tree for {}", abs.display());

        let mut chain = ResolutionChain::default();
        let node = self.build_entry(&abs, &base, &mut chain)?.ok_or_else(|| {
            BuildError::io(
                &abs,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a file, directory, link or shortcut",
                ),
            )
        })?;
        debug!(
            "built tree for {}: {} files, {} bytes",
            abs.display(),
            node.files().len(),
            node.size()
        );
        Ok(node)
    }

    /// Classify one entry and dispatch it. `None` for special files (fifos, sockets, devices).
    fn build_entry(
        &self,
        path: &Path,
        base: &Path,
        chain: &mut ResolutionChain,
    ) -> Result<Option<FileNode>, BuildError> {
        let meta = fs::symlink_metadata(path).map_err(|e| BuildError::io(path, e))?;

        if meta.file_type().is_symlink() {
            let target = fs::read_link(path).map_err(|e| BuildError::io(path, e))?;
            return self.follow(path, &resolve_link_target(path, &target), base, chain);
        }
        if meta.is_file() && is_shortcut(path) {
            let target = self
                .shortcuts
                .resolve(path)
                .map_err(|e| BuildError::io(path, e))?;
            return self.follow(path, &resolve_link_target(path, &target), base, chain);
        }
        if !meta.is_dir() && !meta.is_file() {
            debug!("skipping special file {}", path.display());
            return Ok(None);
        }

        let real = path.canonicalize().map_err(|e| BuildError::io(path, e))?;
        chain.scoped(real, path, |chain| {
            if meta.is_dir() {
                self.build_directory(path, base, chain).map(Some)
            } else {
                let file = RegularFile::new(report_path(path, base), meta.len(), path);
                Ok(Some(file.into()))
            }
        })
    }

    /// Resolve a symlink or shortcut by building its target under the link's own guard entry.
    fn follow(
        &self,
        link: &Path,
        target: &Path,
        base: &Path,
        chain: &mut ResolutionChain,
    ) -> Result<Option<FileNode>, BuildError> {
        debug!("following {} -> {}", link.display(), target.display());
        let identity = link_identity(link).map_err(|e| BuildError::io(link, e))?;
        chain.scoped(identity, link, |chain| self.build_entry(target, base, chain))
    }

    fn build_directory(
        &self,
        path: &Path,
        base: &Path,
        chain: &mut ResolutionChain,
    ) -> Result<FileNode, BuildError> {
        let mut dir = Directory::new(report_path(path, base));
        for entry in fs::read_dir(path).map_err(|e| BuildError::io(path, e))? {
            let entry = entry.map_err(|e| BuildError::io(path, e))?;
            if let Some(child) = self.build_entry(&entry.path(), base, chain)? {
                dir.add_child(child);
            }
        }
        Ok(dir.into())
    }
}

fn report_path(path: &Path, base: &Path) -> String {
    path_to_report_string(&relative_path(path, base))
}

/// Real paths on the resolution chain of the current `build` call.
/// Entries live exactly as long as the frame that added them, including error exits.
#[derive(Default)]
struct ResolutionChain {
    active: HashSet<PathBuf>,
}

impl ResolutionChain {
    fn scoped<T>(
        &mut self,
        key: PathBuf,
        shown: &Path,
        f: impl FnOnce(&mut Self) -> Result<T, BuildError>,
    ) -> Result<T, BuildError> {
        if !self.active.insert(key.clone()) {
            return Err(BuildError::CycleDetected {
                path: shown.to_path_buf(),
            });
        }
        let result = f(self);
        self.active.remove(&key);
        result
    }
}
