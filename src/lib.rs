//! treesum: build an in-memory file tree and checksum every file through a pausable writer.
//!
//! Data flow: [`TreeBuilder`](tree::TreeBuilder) → [`FileNode`] →
//! [`Dispatcher`](tree::Dispatcher) → [`HashWriter`](pipeline::HashWriter) queue →
//! [`ChecksumCalculator`](engine::ChecksumCalculator) → report sink, with [`Event`]s published
//! along the way.

pub mod engine;
pub mod error;
pub mod events;
pub mod index;
pub mod pipeline;
pub mod tree;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{BuildError, ChecksumError};
pub use events::{Event, EventBus, EventListener, SubscriptionId};
pub use index::{build_tree, checksum_dir, run_checksums};

/// Result alias used by public treesum API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
