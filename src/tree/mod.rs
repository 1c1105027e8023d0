//! File tree construction and traversal.

pub mod builder;
pub mod shortcut;
pub mod visitor;

pub use builder::TreeBuilder;
pub use shortcut::{LnkResolver, ShortcutResolver, is_shortcut, parse_lnk_target};
pub use visitor::{Dispatcher, FileSink, FileVisitor};
