//! End-to-end runs: build tree → dispatch files → writer → report sink.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select, unbounded};
use log::{debug, warn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::hashing::DigestCalculator;
use crate::events::{Event, EventBus, EventListener};
use crate::pipeline::HashWriter;
use crate::tree::{Dispatcher, TreeBuilder};
use crate::{FileNode, Opts, RunSummary};

/// Build the tree for `root` with the default shortcut resolver.
pub fn build_tree(root: &Path) -> Result<FileNode> {
    TreeBuilder::new()
        .build(root)
        .with_context(|| format!("build tree for {}", root.display()))
}

/// Hash every file of `tree` into `sink`, one `"<hex> <path>"` line per file that succeeds.
///
/// Blocks until every dispatched file has completed, or until `cancel` receives (or is
/// disconnected). On cancel the writer stops after its current file and the rest are dropped.
/// `listener` is subscribed before any file is queued.
pub fn run_checksums(
    tree: &FileNode,
    opts: &Opts,
    sink: Box<dyn Write + Send>,
    cancel: Option<&Receiver<()>>,
    listener: Option<Arc<dyn EventListener>>,
) -> Result<RunSummary> {
    let calculator =
        Arc::new(DigestCalculator::new(opts.algorithm).with_chunk_size(opts.chunk_size));
    let events = Arc::new(EventBus::new());
    let failed = Arc::new(AtomicUsize::new(0));
    {
        let failed = Arc::clone(&failed);
        events.subscribe(move |event: &Event| {
            if let Event::Error { .. } = event {
                failed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        });
    }
    if let Some(listener) = listener {
        events.subscribe_shared(listener);
    }

    let (done_tx, done_rx) = unbounded::<()>();
    let writer = HashWriter::builder(calculator, sink)
        .completion(done_tx)
        .events(Arc::clone(&events))
        .spawn()?;

    let mut dispatcher = Dispatcher::new(&writer);
    dispatcher.visit(tree);
    let dispatched = dispatcher.dispatched();
    debug!("dispatched {} file(s) ({} bytes)", dispatched, tree.size());

    let (mut completed, cancelled) = wait_for_completions(&done_rx, dispatched, cancel);
    writer.stop();
    writer.join()?;
    if cancelled {
        completed += done_rx.try_iter().count();
        warn!(
            "cancelled: {} of {} file(s) processed, {} dropped",
            completed,
            dispatched,
            writer.pending()
        );
    }

    Ok(RunSummary {
        dispatched,
        completed,
        failed: failed.load(Ordering::Relaxed),
        total_bytes: tree.size(),
        cancelled,
    })
}

/// Build `root` and hash it into `sink` with `opts`. No cancellation, no extra listener.
pub fn checksum_dir(root: &Path, opts: &Opts, sink: Box<dyn Write + Send>) -> Result<RunSummary> {
    let tree = build_tree(root)?;
    run_checksums(&tree, opts, sink, None, None)
}

/// Count completions until `expected`, or stop early on cancel. Returns (completed, cancelled).
fn wait_for_completions(
    done_rx: &Receiver<()>,
    expected: usize,
    cancel: Option<&Receiver<()>>,
) -> (usize, bool) {
    let never = crossbeam_channel::never();
    let cancel = cancel.unwrap_or(&never);
    let mut completed = 0_usize;
    while completed < expected {
        select! {
            recv(done_rx) -> msg => match msg {
                Ok(()) => completed += 1,
                // Worker exited early; nothing more will complete.
                Err(_) => break,
            },
            recv(cancel) -> _ => return (completed, true),
        }
    }
    (completed, false)
}
