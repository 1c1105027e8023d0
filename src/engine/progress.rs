//! Progress bar utilities for displaying hashing status

use kdam::{Animation, Bar, BarExt};
use log::{debug, info};
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::{Event, EventListener};
use crate::utils::config::ProgressConsts;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Force a refresh of the bar.
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub unit: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: &'static str, unit: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            unit,
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        unit = config.unit,
        unit_scale = true,
        animation = config.animation
    )))
}

/// Advance the bar by `n`.
/// Events arrive on the writer thread only, so the lock is never contended for long.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if n == 0 {
        return;
    }
    let mut bar = pb.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = bar.update(n);
}

/// Byte counts are u64; the bar counts in usize (32 bits on some targets).
pub fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[derive(Default)]
struct FileProgress {
    total: u64,
    read: u64,
}

/// Event subscriber that turns writer/calculator events into a byte-based progress bar.
pub struct ProgressReporter {
    bar: ProgressBar,
    current: Mutex<FileProgress>,
}

impl ProgressReporter {
    /// `total_bytes` is the rolled-up size of the tree being hashed.
    pub fn new(total_bytes: u64) -> Self {
        let bar = create_progress_bar(ProgressBarConfig::new(
            saturating_usize(total_bytes),
            ProgressConsts::DESC,
            ProgressConsts::UNIT,
            Animation::Classic,
        ));
        Self::with_bar(bar)
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            current: Mutex::new(FileProgress::default()),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    fn current(&self) -> std::sync::MutexGuard<'_, FileProgress> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for ProgressReporter {
    fn on_event(&self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::NewFile { path, total_bytes } => {
                debug!("hashing {} ({} bytes)", path, total_bytes);
                *self.current() = FileProgress {
                    total: *total_bytes,
                    read: 0,
                };
            }
            Event::ProgressUpdate { bytes_read } => {
                let delta = {
                    let mut cur = self.current();
                    let delta = bytes_read.saturating_sub(cur.read);
                    cur.read = *bytes_read;
                    delta
                };
                update_progress_bar(&self.bar, saturating_usize(delta));
            }
            Event::Error { .. } => {
                // Count the failed file's unread bytes so the bar still reaches 100%.
                let rest = {
                    let mut cur = self.current();
                    let rest = cur.total.saturating_sub(cur.read);
                    cur.read = cur.total;
                    rest
                };
                update_progress_bar(&self.bar, saturating_usize(rest));
            }
            Event::Paused { message } | Event::Resumed { message } => info!("{}", message),
            Event::Complete { .. } => refresh_bar(&self.bar),
        }
        Ok(())
    }
}
