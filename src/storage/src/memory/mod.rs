use std::io;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;

use crate::{read_slice, RandomAccessFile, Writable};

/// MemoryFile is a RandomAccessFile over bytes that are already resident, such as a
/// buffer received from elsewhere or a mapping created by the caller.
#[derive(Clone, Debug)]
pub struct MemoryFile {
    data: Bytes,
}

impl MemoryFile {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl RandomAccessFile for MemoryFile {
    fn read(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        read_slice(&self.data, offset, buf)
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn modified(&self) -> Option<SystemTime> {
        None
    }
}

impl Writable for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        self.extend_from_slice(data);
        Ok(data.len())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("write {}..{} past end of {} bytes", start, end, self.len()),
            ));
        }
        self[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryFile;
    use crate::{RandomAccessFile, Writable};

    #[test]
    fn test_memory_file() {
        let f = MemoryFile::new(b"abcdef".to_vec());
        let mut buf = [0_u8; 2];
        f.read(4, &mut buf).unwrap();
        assert_eq!(&buf, b"ef");
        assert!(f.read(5, &mut buf).is_err());
        assert!(f.path().is_none());
    }

    #[test]
    fn test_vec_writable() {
        let mut w: Vec<u8> = Vec::new();
        w.write_bytes(b"0000tail").unwrap();
        w.write_at(0, b"head").unwrap();
        assert_eq!(w.as_slice(), b"headtail");
        assert!(w.write_at(6, b"xyz").is_err());
        assert_eq!(Writable::size(&w), 8);
    }
}
