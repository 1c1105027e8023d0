//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use treesum::pipeline::ByteSource;
use treesum::{Event, EventBus, RegularFile};

pub const MD5_ABC: &str = "900150983cd24fb0d6963f7d28e17f72";
pub const MD5_EMPTY: &str = "d41d8cd98f00b204e9800998ecf8427e";
pub const MD5_HELLO_WORLD: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
pub const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

#[cfg(windows)]
pub const NL: &str = "\r\n";
#[cfg(not(windows))]
pub const NL: &str = "\n";

/// Cloneable in-memory sink; clones share the buffer.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Yields `data` until `fail_at` bytes were read, then errors.
pub struct FailAfter {
    data: Vec<u8>,
    pos: usize,
    fail_at: usize,
    dropped: Arc<AtomicBool>,
}

impl FailAfter {
    pub fn new(data: &[u8], fail_at: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            fail_at,
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set when the reader is dropped (closed).
    pub fn drop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dropped)
    }
}

impl Read for FailAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.fail_at {
            return Err(io::Error::other("device went away"));
        }
        let end = self.fail_at.min(self.data.len()).min(self.pos + buf.len());
        let n = end - self.pos;
        buf[..n].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}

impl Drop for FailAfter {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Serves file content from memory by report path. Paths in `broken` fail halfway through.
#[derive(Default)]
pub struct MemSource {
    files: HashMap<String, Vec<u8>>,
    broken: Vec<String>,
}

impl MemSource {
    pub fn with(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn broken(mut self, path: &str, content: &[u8]) -> Self {
        self.broken.push(path.to_string());
        self.with(path, content)
    }
}

impl ByteSource for MemSource {
    fn open(&self, file: &RegularFile) -> io::Result<Box<dyn Read + Send>> {
        let data = self
            .files
            .get(file.path())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file.path().to_string()))?;
        if self.broken.iter().any(|p| p == file.path()) {
            Ok(Box::new(FailAfter::new(data, data.len() / 2)))
        } else {
            Ok(Box::new(io::Cursor::new(data.clone())))
        }
    }
}

pub fn mem_file(path: &str, content: &[u8]) -> RegularFile {
    RegularFile::new(path, content.len() as u64, Path::new("/nonexistent").join(path))
}

/// Bus with a listener that records every event.
pub fn recorded_bus() -> (Arc<EventBus>, Arc<Mutex<Vec<Event>>>) {
    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(move |event: &Event| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    (bus, seen)
}

pub fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

pub fn position(events: &[Event], pred: impl Fn(&Event) -> bool) -> Option<usize> {
    events.iter().position(pred)
}
