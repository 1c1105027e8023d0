//! Public types: the file tree model, run options and run summary.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::engine::hashing::Algorithm;
use crate::tree::visitor::FileVisitor;

/// A regular file found by the tree builder.
///
/// `path` is relative to the parent of the traversal root and always uses `/` separators, so
/// reports from two runs over the same logical directory compare equal. `location` is where the
/// bytes are read from; it does not take part in equality.
#[derive(Clone, Debug)]
pub struct RegularFile {
    path: String,
    size: u64,
    location: PathBuf,
}

impl RegularFile {
    pub fn new(path: impl Into<String>, size: u64, location: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size,
            location: location.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Absolute path the writer opens to stream the content.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl PartialEq for RegularFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.size == other.size
    }
}

impl Eq for RegularFile {}

impl Hash for RegularFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.size.hash(state);
    }
}

/// A directory and its children in filesystem enumeration order.
///
/// `size` is the sum of every descendant regular file and is kept up to date by
/// [`Directory::add_child`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directory {
    path: String,
    size: u64,
    children: Vec<FileNode>,
}

impl Directory {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: 0,
            children: Vec::new(),
        }
    }

    /// Append a child and roll its size up into this directory.
    pub fn add_child(&mut self, child: FileNode) {
        self.size += child.size();
        self.children.push(child);
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn children(&self) -> &[FileNode] {
        &self.children
    }
}

/// One node of the built tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileNode {
    File(RegularFile),
    Directory(Directory),
}

impl FileNode {
    pub fn path(&self) -> &str {
        match self {
            FileNode::File(f) => f.path(),
            FileNode::Directory(d) => d.path(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            FileNode::File(f) => f.size(),
            FileNode::Directory(d) => d.size(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileNode::Directory(_))
    }

    /// Double dispatch into `visitor`.
    pub fn accept<V: FileVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            FileNode::File(f) => visitor.visit_file(f),
            FileNode::Directory(d) => visitor.visit_directory(d),
        }
    }

    /// Every regular file below (or equal to) this node, depth-first in insertion order.
    pub fn files(&self) -> Vec<&RegularFile> {
        let mut out = Vec::new();
        collect_files(self, &mut out);
        out
    }
}

fn collect_files<'a>(node: &'a FileNode, out: &mut Vec<&'a RegularFile>) {
    match node {
        FileNode::File(f) => out.push(f),
        FileNode::Directory(d) => {
            for child in d.children() {
                collect_files(child, out);
            }
        }
    }
}

impl From<RegularFile> for FileNode {
    fn from(f: RegularFile) -> Self {
        FileNode::File(f)
    }
}

impl From<Directory> for FileNode {
    fn from(d: Directory) -> Self {
        FileNode::Directory(d)
    }
}

/// Run options (CLI, `.treesum.toml`, or lib callers).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Digest algorithm for the report.
    pub algorithm: Algorithm,
    /// Report file. When None the caller picks the sink (stdout for the CLI).
    pub output: Option<PathBuf>,
    /// Show a progress bar on stderr.
    pub progress: bool,
    /// Debug-level logging for this crate.
    pub verbose: bool,
    /// Read chunk size for the calculator; also the progress event granularity.
    pub chunk_size: usize,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            algorithm: Algorithm::default(),
            output: None,
            progress: false,
            verbose: false,
            chunk_size: crate::utils::config::HashingConsts::READ_CHUNK_SIZE,
        }
    }
}

/// What a run did. Returned by [`run_checksums`](crate::index::run_checksums).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files handed to the writer.
    pub dispatched: usize,
    /// Files the writer finished (success or failure).
    pub completed: usize,
    /// Files that produced an `Error` event instead of a report line.
    pub failed: usize,
    /// Rolled-up size of the tree that was dispatched.
    pub total_bytes: u64,
    /// Stopped early by a cancel signal.
    pub cancelled: bool,
}
