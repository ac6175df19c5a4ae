//! Seekable byte sources.
//!
//! Every parser in romkit reads through the [`ByteSource`] trait. Files and
//! in-memory buffers enter through [`IoSource`]; disc readers and partition
//! files implement the trait themselves so they can be stacked.
//!
//! ## Sharing
//! A parsed object graph (RomData → disc reader → ISO partition → partition
//! file) reads from one root source. [`SourceRef`] is the shared handle:
//! cloning it acquires a reference, dropping it releases one, and the
//! underlying source closes when the last holder goes away. Child readers
//! hold clones of their parent's handle and never close it themselves.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Error, Result};

/// Random-access byte stream.
///
/// Positions and sizes are absolute byte offsets. `read` fills as much of
/// `buf` as the source can provide and returns the count; a short count
/// means end of data, not an error.
pub trait ByteSource: Send {
    /// Read from the current position, advancing it.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the current position. Positions past [`ByteSource::size`] are
    /// rejected with [`Error::InvalidRange`].
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current position.
    fn tell(&self) -> u64;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// False once the source has been closed or if it never opened.
    fn is_open(&self) -> bool {
        true
    }

    /// Seek to `pos` and read.
    fn seek_and_read(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek(pos)?;
        self.read(buf)
    }

    /// Seek to `pos` and fill `buf` completely.
    ///
    /// A short read is reported as [`Error::UnexpectedEof`].
    fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        if self.seek_and_read(pos, buf)? != buf.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }
}

/// [`ByteSource`] adapter over any `Read + Seek` (files, cursors, ...).
pub struct IoSource<R> {
    inner: Option<R>,
    pos: u64,
    size: u64,
}

impl IoSource<File> {
    /// Open a file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> IoSource<R> {
    /// Wrap `inner`, measuring its size once.
    pub fn new(mut inner: R) -> Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Some(inner),
            pos: 0,
            size,
        })
    }

    /// Release the inner reader. Later reads fail with
    /// [`Error::BadDescriptor`].
    pub fn close(&mut self) {
        self.inner = None;
    }

    /// Consume the adapter, returning the inner reader if still open.
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }
}

impl<R: Read + Seek + Send> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let inner = self.inner.as_mut().ok_or(Error::BadDescriptor)?;
        inner.seek(SeekFrom::Start(self.pos))?;
        let mut total = 0;
        while total < buf.len() {
            match inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += total as u64;
        Ok(total)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if self.inner.is_none() {
            return Err(Error::BadDescriptor);
        }
        if pos > self.size {
            return Err(Error::InvalidRange);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}

/// Shared, reference-counted handle to a [`ByteSource`].
///
/// Clones share the source and its position; [`SourceRef::seek_and_read`]
/// and [`SourceRef::read_exact_at`] hold the lock across the seek and the
/// read, so stacked readers never interleave.
#[derive(Clone)]
pub struct SourceRef(Arc<Mutex<Box<dyn ByteSource>>>);

impl SourceRef {
    /// Take ownership of `source` behind a new handle.
    pub fn new<S: ByteSource + 'static>(source: S) -> Self {
        Self(Arc::new(Mutex::new(Box::new(source))))
    }

    /// Wrap a `Read + Seek` value.
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Result<Self> {
        Ok(Self::new(IoSource::new(reader)?))
    }

    /// Open a file by path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(IoSource::open(path)?))
    }

    /// Number of live handles to this source.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn ByteSource>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seek and read in one locked step.
    pub fn seek_and_read(&self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.lock().seek_and_read(pos, buf)
    }

    /// Seek and fill `buf` completely in one locked step.
    pub fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.lock().read_exact_at(pos, buf)
    }

    /// Read `len` bytes at `pos` into a new buffer.
    pub fn read_vec_at(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(pos, &mut buf)?;
        Ok(buf)
    }

    /// Total size of the shared source.
    pub fn size(&self) -> u64 {
        self.lock().size()
    }

    /// Whether the shared source is still open.
    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }
}

impl ByteSource for SourceRef {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.lock().seek(pos)
    }

    fn tell(&self) -> u64 {
        self.lock().tell()
    }

    fn size(&self) -> u64 {
        SourceRef::size(self)
    }

    fn is_open(&self) -> bool {
        SourceRef::is_open(self)
    }

    fn seek_and_read(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        SourceRef::seek_and_read(self, pos, buf)
    }
}

impl std::fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRef")
            .field("refs", &self.ref_count())
            .finish_non_exhaustive()
    }
}
