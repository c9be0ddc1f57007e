//! Capped stream capture.
//!
//! A reader keeps at most `cap` bytes and discards the rest while still
//! draining the pipe, so a chatty child never blocks on a full pipe and
//! memory stays bounded. The buffer is shared so a caller can take partial
//! output even if the reader task has to be abandoned.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Default)]
struct Inner {
    bytes: Vec<u8>,
    total: u64,
}

/// Bytes captured from one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub bytes: Vec<u8>,
    /// Everything the stream produced, kept or not.
    pub total: u64,
    pub truncated: bool,
}

/// Shared, capped capture buffer.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Inner>>,
    cap: usize,
}

impl CaptureBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            cap,
        }
    }

    fn push(&self, chunk: &[u8]) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.total += chunk.len() as u64;
        let room = self.cap.saturating_sub(inner.bytes.len());
        let take = room.min(chunk.len());
        inner.bytes.extend_from_slice(&chunk[..take]);
    }

    /// Read `reader` to EOF, keeping at most `cap` bytes.
    pub async fn fill<R>(&self, mut reader: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            self.push(&chunk[..n]);
        }
    }

    /// Whatever has been captured so far.
    pub fn snapshot(&self) -> Captured {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Captured {
            bytes: inner.bytes.clone(),
            total: inner.total,
            truncated: inner.total > inner.bytes.len() as u64,
        }
    }
}
