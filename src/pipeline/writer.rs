//! The checksum writer: one background worker that drains a FIFO of files, hashes each one and
//! appends `"<hex> <path>"` lines to an output sink.
//!
//! Producer-side calls (`add_to_process`, `pause`, `resume`, `stop`, `change_calculator`,
//! `save`, `restore`) never wait on the worker. The worker sleeps on a condvar while paused or
//! while the queue is empty. Per-file failures become `Error` events; the worker keeps going.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::RegularFile;
use crate::engine::hashing::ChecksumCalculator;
use crate::events::{Event, EventBus, SubscriptionId};
use crate::tree::visitor::FileSink;
use crate::utils::config::PackagePaths;

use super::completion::CompletionTracker;
use super::snapshot::Snapshot;
use super::source::{ByteSource, FsByteSource};

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// Writer lifecycle. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

/// Everything the producer and the worker share. One lock, so a calculator swap, a dequeue and
/// a state change are always observed in a single order.
struct WriterState {
    queue: VecDeque<RegularFile>,
    run: RunState,
    calculator: Arc<dyn ChecksumCalculator>,
    /// Subscription on the current calculator's bus that forwards into ours.
    forwarding: Option<SubscriptionId>,
}

struct Shared {
    state: Mutex<WriterState>,
    wake: Condvar,
    events: Arc<EventBus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until there is something for the worker to do.
    /// `announced_pause` is whether the worker has already published `Paused` for the current
    /// pause interval.
    fn next_step(&self, announced_pause: bool) -> Step {
        let mut st = self.lock();
        loop {
            match st.run {
                RunState::Stopped => return Step::Exit,
                RunState::Paused if !announced_pause => return Step::Pause,
                RunState::Running if announced_pause => return Step::Resume,
                RunState::Running => {
                    if let Some(file) = st.queue.pop_front() {
                        return Step::Process(file, Arc::clone(&st.calculator));
                    }
                }
                RunState::Paused => {}
            }
            st = self.wake.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

enum Step {
    Pause,
    Resume,
    Process(RegularFile, Arc<dyn ChecksumCalculator>),
    Exit,
}

/// Subscribe a forwarder from `calculator`'s bus into `events`, if the calculator publishes.
fn forward_events(
    calculator: &dyn ChecksumCalculator,
    events: &Arc<EventBus>,
) -> Option<SubscriptionId> {
    calculator.events().map(|bus| {
        let events = Arc::clone(events);
        bus.subscribe(move |event: &Event| {
            events.publish(event.clone());
            Ok(())
        })
    })
}

/// Configures and starts a [`HashWriter`].
pub struct WriterBuilder {
    calculator: Arc<dyn ChecksumCalculator>,
    sink: Box<dyn Write + Send>,
    completion: Option<Box<dyn CompletionTracker>>,
    source: Box<dyn ByteSource>,
    events: Option<Arc<EventBus>>,
    start_paused: bool,
}

impl WriterBuilder {
    /// Signalled once per processed file (success or failure).
    pub fn completion(mut self, tracker: impl CompletionTracker + 'static) -> Self {
        self.completion = Some(Box::new(tracker));
        self
    }

    /// Replace the default on-disk [`FsByteSource`].
    pub fn source(mut self, source: impl ByteSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Publish on a bus the caller already holds (and may have subscribed to).
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Start in `Paused`; nothing is processed until [`HashWriter::resume`].
    pub fn start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }

    /// Spawn the worker thread.
    pub fn spawn(self) -> Result<HashWriter> {
        let events = self.events.unwrap_or_default();
        let forwarding = forward_events(&*self.calculator, &events);
        let run = if self.start_paused {
            RunState::Paused
        } else {
            RunState::Running
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(WriterState {
                queue: VecDeque::new(),
                run,
                calculator: self.calculator,
                forwarding,
            }),
            wake: Condvar::new(),
            events,
        });

        let worker = Worker {
            shared: Arc::clone(&shared),
            sink: self.sink,
            source: self.source,
            completion: self.completion,
        };
        let handle = thread::Builder::new()
            .name(PackagePaths::get().writer_thread_name().to_string())
            .spawn(move || worker.run())
            .context("spawn writer thread")?;
        debug!("writer started ({:?})", run);

        Ok(HashWriter {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }
}

/// Handle to a running writer. Dropping it stops the worker and waits for it.
pub struct HashWriter {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HashWriter {
    pub fn builder(
        calculator: Arc<dyn ChecksumCalculator>,
        sink: Box<dyn Write + Send>,
    ) -> WriterBuilder {
        WriterBuilder {
            calculator,
            sink,
            completion: None,
            source: Box::new(FsByteSource),
            events: None,
            start_paused: false,
        }
    }

    /// Queue a file. Never blocks. Files queued after `stop` are never processed.
    pub fn add_to_process(&self, file: RegularFile) {
        self.shared.lock().queue.push_back(file);
        self.shared.wake.notify_all();
    }

    /// Takes effect before the next file starts; a file being hashed is never interrupted.
    pub fn pause(&self) {
        let mut st = self.shared.lock();
        if st.run == RunState::Running {
            st.run = RunState::Paused;
            debug!("writer pause requested");
        }
        drop(st);
        // An idle worker wakes up to announce the pause.
        self.shared.wake.notify_all();
    }

    pub fn resume(&self) {
        let mut st = self.shared.lock();
        if st.run == RunState::Paused {
            st.run = RunState::Running;
            debug!("writer resume requested");
        }
        drop(st);
        self.shared.wake.notify_all();
    }

    /// Ask the worker to finish the current file (if any) and exit. Also wakes a paused worker.
    /// Idempotent.
    pub fn stop(&self) {
        let mut st = self.shared.lock();
        if st.run != RunState::Stopped {
            st.run = RunState::Stopped;
            debug!("writer stop requested, {} file(s) left in queue", st.queue.len());
        }
        drop(st);
        self.shared.wake.notify_all();
    }

    /// Swap the calculator used from the next dequeued file on. Event forwarding moves from the
    /// old calculator to the new one in the same step.
    pub fn change_calculator(&self, calculator: Arc<dyn ChecksumCalculator>) {
        let mut st = self.shared.lock();
        if let Some(id) = st.forwarding.take()
            && let Some(bus) = st.calculator.events()
        {
            bus.unsubscribe(id);
        }
        st.forwarding = forward_events(&*calculator, &self.shared.events);
        debug!(
            "writer calculator changed: {} -> {}",
            st.calculator.name(),
            calculator.name()
        );
        st.calculator = calculator;
    }

    /// Copy of the pending queue.
    pub fn save(&self) -> Snapshot {
        Snapshot::new(self.shared.lock().queue.iter().cloned().collect())
    }

    /// Replace the pending queue with the snapshot's files.
    pub fn restore(&self, snapshot: &Snapshot) {
        let mut st = self.shared.lock();
        st.queue = snapshot.files().iter().cloned().collect();
        debug!("writer queue restored with {} file(s)", st.queue.len());
        drop(st);
        self.shared.wake.notify_all();
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Drop every pending file. Returns how many were dropped.
    pub fn clear_pending(&self) -> usize {
        let mut st = self.shared.lock();
        let n = st.queue.len();
        st.queue.clear();
        n
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().run
    }

    /// Bus carrying writer events and forwarded calculator events.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Wait for the worker to exit. Call after [`stop`](Self::stop); returns at once if already
    /// joined.
    pub fn join(&self) -> Result<()> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("writer thread panicked"))?;
        }
        Ok(())
    }
}

impl FileSink for HashWriter {
    fn add_to_process(&self, file: RegularFile) {
        HashWriter::add_to_process(self, file);
    }
}

impl Drop for HashWriter {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join() {
            warn!("{:#}", e);
        }
    }
}

/// State owned by the worker thread alone.
struct Worker {
    shared: Arc<Shared>,
    sink: Box<dyn Write + Send>,
    source: Box<dyn ByteSource>,
    completion: Option<Box<dyn CompletionTracker>>,
}

impl Worker {
    fn run(mut self) {
        let mut paused = false;
        loop {
            match self.shared.next_step(paused) {
                Step::Pause => {
                    paused = true;
                    self.shared.events.publish(Event::paused());
                }
                Step::Resume => {
                    paused = false;
                    self.shared.events.publish(Event::resumed());
                }
                Step::Process(file, calculator) => self.process(&file, &*calculator),
                Step::Exit => break,
            }
        }
        if paused {
            self.shared.events.publish(Event::resumed());
        }
        self.finish();
    }

    fn process(&mut self, file: &RegularFile, calculator: &dyn ChecksumCalculator) {
        self.shared.events.publish(Event::NewFile {
            path: file.path().to_string(),
            total_bytes: file.size(),
        });

        let outcome = self
            .source
            .open(file)
            .map_err(anyhow::Error::from)
            .and_then(|input| calculate_isolated(calculator, input))
            .and_then(|hex| self.write_line(&hex, file.path()));

        if let Err(e) = outcome {
            warn!("{}: {:#}", file.path(), e);
            self.shared
                .events
                .publish(Event::error(format!("{}: {:#}", file.path(), e)));
        }
        if let Some(tracker) = &self.completion {
            tracker.complete();
        }
    }

    fn write_line(&mut self, hex: &str, path: &str) -> Result<()> {
        write!(self.sink, "{hex} {path}{LINE_SEPARATOR}").context("write report line")?;
        self.sink.flush().context("flush report")?;
        Ok(())
    }

    /// Flush and close the sink, then announce completion. Runs once, on the way out.
    fn finish(self) {
        let Worker {
            shared, mut sink, ..
        } = self;
        if let Err(e) = sink.flush() {
            warn!("flush report on stop: {}", e);
        }
        drop(sink);
        debug!("writer stopped");
        shared.events.publish(Event::complete());
    }
}

/// Run one digest; a panicking calculator fails this file only.
fn calculate_isolated(
    calculator: &dyn ChecksumCalculator,
    input: Box<dyn Read + Send>,
) -> Result<String> {
    match catch_unwind(AssertUnwindSafe(|| calculator.calculate(input))) {
        Ok(digest) => Ok(digest?),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(anyhow::anyhow!(
                "checksum calculator {} panicked: {}",
                calculator.name(),
                reason
            ))
        }
    }
}
