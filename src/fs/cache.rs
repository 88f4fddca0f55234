//! Positional read cache.
//!
//! Sits in front of [`File::read`] and serves repeated reads of the same
//! region from one cached span. The cache only ever issues positional
//! reads, so no fd offset is mutated on a hit or a miss.

use crate::config;
use crate::error::SysError;
use crate::fs::file::{File, ReadReply};

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Span {
    offset: u64,
    bytes: Vec<u8>,
}

impl Span {
    fn covers(&self, offset: u64, nbytes: usize) -> bool {
        offset >= self.offset
            && offset + nbytes as u64 <= self.offset + self.bytes.len() as u64
    }

    fn slice(&self, offset: u64, nbytes: usize) -> Vec<u8> {
        let start = (offset - self.offset) as usize;
        self.bytes[start..start + nbytes].to_vec()
    }
}

/// A read cache wrapping one file.
pub struct ReadCache<'a> {
    file: &'a File,
    size: usize,
    span: Mutex<Option<Span>>,
    fetches: AtomicUsize,
}

impl<'a> ReadCache<'a> {
    /// Cache with the process-wide configured span size; 0 disables
    /// caching and every read delegates.
    pub fn new(file: &'a File) -> Self {
        Self::with_size(file, config::read_cache_size())
    }

    pub fn with_size(file: &'a File, size: usize) -> Self {
        Self {
            file,
            size,
            span: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Positional read through the cache.
    pub async fn pread(
        &self,
        nbytes: usize,
        offset: u64,
        timeout: Option<Duration>,
    ) -> Result<ReadReply, SysError> {
        if self.size == 0 {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            return self.file.read(nbytes, offset, timeout).await;
        }

        {
            let span = self.span.lock().unwrap();
            if let Some(span) = span.as_ref()
                && span.covers(offset, nbytes)
            {
                let data = span.slice(offset, nbytes);
                let rc = data.len() as isize;
                return Ok(ReadReply {
                    rc,
                    errno: 0,
                    data: Some(data),
                    offset: offset + rc as u64,
                });
            }
        }

        // Miss: fetch a whole span and serve the request out of it.
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let want = nbytes.max(self.size);
        let mut reply = self.file.read(want, offset, timeout).await?;

        let Some(bytes) = reply.data.take() else {
            return Ok(reply);
        };

        let served: Vec<u8> = bytes.iter().copied().take(nbytes).collect();
        *self.span.lock().unwrap() = Some(Span { offset, bytes });

        let rc = served.len() as isize;
        Ok(ReadReply {
            rc,
            errno: 0,
            data: Some(served),
            offset: offset + rc as u64,
        })
    }

    /// Number of reads that went to the file instead of the span.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}
