//! Per-file completion signalling for callers waiting on a run.

use crossbeam_channel::Sender;

/// Told once per dequeued file, after success or failure.
pub trait CompletionTracker: Send {
    fn complete(&self);
}

/// Each completion is one message; the receiver counts them (or waits with a timeout).
impl CompletionTracker for Sender<()> {
    fn complete(&self) {
        // Receiver gone means nobody is waiting any more.
        let _ = self.send(());
    }
}
