//! Pipeline components: the checksum writer, its snapshots, byte sources and completion signals.

pub mod completion;
pub mod snapshot;
pub mod source;
pub mod writer;

pub use completion::CompletionTracker;
pub use snapshot::Snapshot;
pub use source::{ByteSource, FsByteSource};
pub use writer::{HashWriter, RunState, WriterBuilder};
