use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use memmap2::MmapOptions;

use crate::{read_slice, RandomAccessFile};

/// MmapReadableFile maps a whole file read-only.
///
/// The mapping is owned by the `Bytes` handle; it is unmapped once the last view derived
/// from `bytes()` is dropped, which may be long after this value itself is gone.
pub struct MmapReadableFile {
    path: PathBuf,
    modified: Option<SystemTime>,
    mmap: Bytes,
}

impl MmapReadableFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let f = File::open(path)?;

        let meta = f.metadata()?;
        let len = meta.len() as usize;

        // zero length mappings are rejected on some platforms
        let mmap = if len == 0 {
            Bytes::new()
        } else {
            let mmap = unsafe { MmapOptions::new().offset(0).len(len).map(&f)? };
            Bytes::from_owner(mmap)
        };

        Ok(Self {
            path: path.to_path_buf(),
            modified: meta.modified().ok(),
            mmap,
        })
    }
}

impl RandomAccessFile for MmapReadableFile {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        read_slice(&self.mmap, offset, buf)
    }

    fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn bytes(&self) -> Bytes {
        self.mmap.clone()
    }

    fn path(&self) -> Option<&Path> {
        Some(self.path.as_path())
    }

    fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use crate::mmap::MmapReadableFile;
    use crate::RandomAccessFile;

    #[test]
    fn test_mmap_readable_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.as_ref().join("mmap_test");

        let data = "0123456789".as_bytes();
        {
            let mut f = std::fs::File::create(&path)?;
            f.write_all(data)?;
            f.sync_all()?;
        }

        let accessor = MmapReadableFile::open(&path)?;
        assert_eq!(accessor.len(), data.len() as u64);
        assert_eq!(accessor.path(), Some(path.as_path()));
        assert!(accessor.modified().is_some());

        let mut buf = vec![0_u8; 4];
        accessor.read(3, &mut buf[..])?;
        assert_eq!(buf.as_slice(), b"3456");

        let err = accessor.read(8, &mut buf[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        // views outlive the accessor
        let view = accessor.bytes().slice(5..);
        drop(accessor);
        assert_eq!(&view[..], b"56789");

        Ok(())
    }

    #[test]
    fn test_empty_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.as_ref().join("empty");
        std::fs::File::create(&path)?;

        let accessor = MmapReadableFile::open(&path)?;
        assert!(accessor.is_empty());
        assert!(accessor.bytes().is_empty());
        Ok(())
    }
}
