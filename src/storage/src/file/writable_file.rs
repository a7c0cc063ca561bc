use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::Writable;

/// WritableFile is a buffered, append-oriented file writer.
pub struct WritableFile {
    path: PathBuf,
    f: BufWriter<File>,
    n: u64,
}

impl WritableFile {
    /// create opens `path` for writing, truncating any previous content.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            f: BufWriter::with_capacity(1024 * 1024, f),
            n: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Writable for WritableFile {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        self.f.write_all(data)?;
        self.n += data.len() as u64;
        Ok(data.len())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        if offset + data.len() as u64 > self.n {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write_at past the end of the written data",
            ));
        }

        // seeking a BufWriter flushes it first
        self.f.seek(SeekFrom::Start(offset))?;
        self.f.write_all(data)?;
        self.f.seek(SeekFrom::Start(self.n))?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.f.flush()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.f.flush()?;
        self.f.get_ref().sync_all()
    }

    fn size(&self) -> u64 {
        self.n
    }
}
