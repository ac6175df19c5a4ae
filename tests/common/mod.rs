//! Shared builders and fakes for integration tests.

#![allow(dead_code)]

pub mod builder;

pub use builder::{IsoBuilder, psv_save, raw_save, to_raw2352};

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use romkit::Result;
use romkit::source::{ByteSource, IoSource, SourceRef};

/// In-memory source that counts `read` calls.
pub struct CountingSource {
    inner: IoSource<Cursor<Vec<u8>>>,
    reads: Arc<AtomicUsize>,
}

impl CountingSource {
    /// Wrap `data`; the returned counter is shared with the source.
    pub fn new(data: Vec<u8>) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let src = Self {
            inner: IoSource::new(Cursor::new(data)).expect("cursor is seekable"),
            reads: Arc::clone(&reads),
        };
        (src, reads)
    }
}

impl ByteSource for CountingSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(pos)
    }

    fn tell(&self) -> u64 {
        self.inner.tell()
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

/// Shared source over `data` plus its read counter.
pub fn counting(data: Vec<u8>) -> (SourceRef, Arc<AtomicUsize>) {
    let (src, reads) = CountingSource::new(data);
    (SourceRef::new(src), reads)
}

/// Shared source over an in-memory buffer.
pub fn memory(data: Vec<u8>) -> SourceRef {
    SourceRef::from_reader(Cursor::new(data)).expect("cursor is seekable")
}
