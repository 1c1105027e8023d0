//! Tree traversal that feeds regular files to a processing sink.

use crate::{Directory, FileNode, RegularFile};

/// Visitor over a built tree. The default directory handling descends into every child in
/// insertion order.
pub trait FileVisitor {
    fn visit_file(&mut self, file: &RegularFile);

    fn visit_directory(&mut self, dir: &Directory) {
        for child in dir.children() {
            child.accept(self);
        }
    }
}

/// Anything that accepts files for processing; implemented by the
/// [`HashWriter`](crate::pipeline::HashWriter). Must not block.
pub trait FileSink {
    fn add_to_process(&self, file: RegularFile);
}

/// Enqueues every regular file of a tree into a [`FileSink`], depth-first, parent before children.
pub struct Dispatcher<'a, S: FileSink + ?Sized> {
    sink: &'a S,
    dispatched: usize,
}

impl<'a, S: FileSink + ?Sized> Dispatcher<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self {
            sink,
            dispatched: 0,
        }
    }

    pub fn visit(&mut self, node: &FileNode) {
        node.accept(self);
    }

    /// Files handed to the sink so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}

impl<S: FileSink + ?Sized> FileVisitor for Dispatcher<'_, S> {
    fn visit_file(&mut self, file: &RegularFile) {
        self.sink.add_to_process(file.clone());
        self.dispatched += 1;
    }
}
