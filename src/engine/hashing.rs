//! Checksum calculators: stream bytes in chunks, publish progress, return a lowercase hex digest.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::ChecksumError;
use crate::events::{Event, EventBus};
use crate::utils::config::HashingConsts;

/// Digest algorithms a [`DigestCalculator`] can resolve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    Md5,
    Sha256,
    Blake3,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha256 => "sha256",
            Algorithm::Blake3 => "blake3",
        }
    }

    /// Digest length in bytes. Hex output is always twice this.
    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha256 | Algorithm::Blake3 => 32,
        }
    }
}

impl FromStr for Algorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha256" => Ok(Algorithm::Sha256),
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(ChecksumError::AlgorithmUnavailable(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running hash state for one `calculate` call.
enum DigestState {
    Md5(Md5),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => DigestState::Md5(Md5::new()),
            Algorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            Algorithm::Blake3 => DigestState::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            DigestState::Md5(h) => h.update(bytes),
            DigestState::Sha256(h) => h.update(bytes),
            DigestState::Blake3(h) => {
                h.update(bytes);
            }
        }
    }

    /// Fixed-width hex: leading zero bytes are kept.
    fn finalize_hex(self) -> String {
        match self {
            DigestState::Md5(h) => hex::encode(h.finalize()),
            DigestState::Sha256(h) => hex::encode(h.finalize()),
            DigestState::Blake3(h) => hex::encode(h.finalize().as_bytes()),
        }
    }
}

/// Computes a content digest for a byte stream.
///
/// Implementations that report progress return their bus from [`events`](Self::events); the
/// writer forwards whatever is published there. The default declines (no events).
pub trait ChecksumCalculator: Send + Sync {
    /// Consume `input` and return the lowercase hex digest of all of it.
    /// `input` is dropped (closed) before returning, on success and on error.
    fn calculate(&self, input: Box<dyn Read + Send>) -> Result<String, ChecksumError>;

    fn events(&self) -> Option<&EventBus> {
        None
    }

    /// Name for logs.
    fn name(&self) -> &str;
}

/// Chunked digest calculator for the algorithms in [`Algorithm`].
///
/// The algorithm is looked up by name on every `calculate`, so a calculator built with
/// [`DigestCalculator::named`] for an unknown name fails per file with
/// [`ChecksumError::AlgorithmUnavailable`] rather than at construction.
#[derive(Debug)]
pub struct DigestCalculator {
    algorithm: String,
    chunk_size: usize,
    events: EventBus,
}

impl DigestCalculator {
    pub fn new(algorithm: Algorithm) -> Self {
        Self::named(algorithm.as_str())
    }

    pub fn named(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            chunk_size: HashingConsts::READ_CHUNK_SIZE,
            events: EventBus::new(),
        }
    }

    pub fn md5() -> Self {
        Self::new(Algorithm::Md5)
    }

    /// Bytes per read (and per `ProgressUpdate`). Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for DigestCalculator {
    fn default() -> Self {
        Self::md5()
    }
}

impl ChecksumCalculator for DigestCalculator {
    fn calculate(&self, mut input: Box<dyn Read + Send>) -> Result<String, ChecksumError> {
        let algorithm = Algorithm::from_str(&self.algorithm)?;
        let mut state = DigestState::new(algorithm);
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;
        loop {
            let n = match input.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            state.update(&buffer[..n]);
            total += n as u64;
            self.events
                .publish(Event::ProgressUpdate { bytes_read: total });
        }
        drop(input);
        Ok(state.finalize_hex())
    }

    fn events(&self) -> Option<&EventBus> {
        Some(&self.events)
    }

    fn name(&self) -> &str {
        &self.algorithm
    }
}
