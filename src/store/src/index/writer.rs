use bytes::{BufMut, Bytes, BytesMut};
use ratingpack_storage::Writable;

use crate::error::{Error, Result};
use crate::format::{INDEX_COUNT_SIZE, INDEX_ENTRY_HEADER_SIZE, INDEX_POSITION_SIZE};

/// IndexTableWriter builds the binary form of an index table.
///
/// The number of entries is fixed up front and entries must arrive in strictly ascending
/// key order; any deviation is a caller bug and fails immediately.
pub struct IndexTableWriter {
    expected: u32,
    written: u32,
    last_key: Option<u64>,
    buf: BytesMut,
}

impl IndexTableWriter {
    pub fn new(expected: u32) -> Self {
        let mut buf = BytesMut::with_capacity(
            INDEX_COUNT_SIZE + expected as usize * (INDEX_ENTRY_HEADER_SIZE + INDEX_POSITION_SIZE),
        );
        buf.put_u32(expected);

        Self {
            expected,
            written: 0,
            last_key: None,
            buf,
        }
    }

    /// write_entry records the slots owned by `key`, in record order.
    pub fn write_entry(&mut self, key: u64, positions: &[u32]) -> Result<()> {
        if self.written >= self.expected {
            return Err(Error::IllegalState(format!(
                "index table is full: {} entries expected",
                self.expected
            )));
        }

        if let Some(last) = self.last_key {
            if key <= last {
                return Err(Error::IllegalState(format!(
                    "keys must be written in ascending order: {} after {}",
                    key, last
                )));
            }
        }

        if positions.is_empty() {
            return Err(Error::IllegalState(format!("key {} has no positions", key)));
        }

        let len = u32::try_from(positions.len()).map_err(|_| {
            Error::IllegalState(format!("key {} owns too many positions", key))
        })?;

        self.buf.reserve(INDEX_ENTRY_HEADER_SIZE + positions.len() * INDEX_POSITION_SIZE);
        self.buf.put_u64(key);
        self.buf.put_u32(len);
        for p in positions {
            self.buf.put_u32(*p);
        }

        self.last_key = Some(key);
        self.written += 1;
        Ok(())
    }

    /// entry_count returns the number of entries written so far.
    pub fn entry_count(&self) -> u32 {
        self.written
    }

    /// size returns the encoded size of the table in bytes so far.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// finish returns the encoded table.  Every expected entry must have been written.
    pub fn finish(self) -> Result<Bytes> {
        if self.written != self.expected {
            return Err(Error::IllegalState(format!(
                "index table has {} entries, {} expected",
                self.written, self.expected
            )));
        }

        Ok(self.buf.freeze())
    }

    /// write_to appends the finished table to `w` and returns the number of bytes written.
    pub fn write_to<W: Writable>(self, w: &mut W) -> Result<u64> {
        let b = self.finish()?;
        w.write_bytes(&b)?;
        Ok(b.len() as u64)
    }
}
