use std::io;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;

pub mod file;
pub mod memory;
pub mod mmap;

/// RandomAccessFile is an immutable, fully addressable byte source.
///
/// Implementations hand out their contents as a shared `Bytes` handle: slicing it never
/// copies and never moves a read position, so any number of readers may hold views of the
/// same file at once.
pub trait RandomAccessFile: Send + Sync {
    /// read copies `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// len returns the size of the file in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// bytes returns a shared view of the whole file.
    fn bytes(&self) -> Bytes;

    /// path returns the backing path, if the file lives on disk.
    fn path(&self) -> Option<&Path>;

    /// modified returns the last modification time of the backing file, if known.
    fn modified(&self) -> Option<SystemTime>;
}

/// Writable is an append-only sink that can patch bytes it has already written.
pub trait Writable {
    /// write_bytes writes `data` at the end and returns the number of bytes written.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize>;

    /// write_at overwrites previously written bytes starting at `offset`.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// sync flushes and makes the written data durable.
    fn sync(&mut self) -> io::Result<()>;

    /// size returns the number of bytes written so far.
    fn size(&self) -> u64;
}

pub(crate) fn read_slice(data: &[u8], offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    let size = buf.len();
    if size == 0 {
        return Ok(0);
    }

    let offset = usize::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset out of range"))?;
    let upper = offset.checked_add(size).unwrap_or(usize::MAX);
    if upper > data.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("read {}..{} past end of {} bytes", offset, upper, data.len()),
        ));
    }

    buf.copy_from_slice(&data[offset..upper]);
    Ok(size)
}
