//! Where the writer gets each file's bytes.

use std::fs::File;
use std::io::{self, Read};

use crate::RegularFile;

/// Opens the content stream for a queued file.
pub trait ByteSource: Send {
    fn open(&self, file: &RegularFile) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads from the file's [`location`](RegularFile::location) on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsByteSource;

impl ByteSource for FsByteSource {
    fn open(&self, file: &RegularFile) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(file.location())?))
    }
}
