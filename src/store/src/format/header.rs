use std::fmt::{Display, Formatter};

use bytes::{Buf, BufMut};
use ratingpack_storage::RandomAccessFile;

use crate::error::{Error, Result};
use crate::format::record::RecordFormat;
use crate::format::{
    FormatFlags, HEADER_SIZE, INDEX_COUNT_SIZE, INDEX_ENTRY_HEADER_SIZE, INDEX_POSITION_SIZE,
    MAGIC_NUMBER, VERSION,
};

/// Header is the fixed size preamble of a packed rating file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    flags: FormatFlags,
    record_count: u32,
    user_count: u32,
    item_count: u32,
}

impl Header {
    pub fn new(flags: FormatFlags, record_count: u32, user_count: u32, item_count: u32) -> Self {
        Self {
            flags,
            record_count,
            user_count,
            item_count,
        }
    }

    /// empty returns the header of a file with no records.
    pub fn empty(flags: FormatFlags) -> Self {
        Self::new(flags, 0, 0, 0)
    }

    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    pub fn has_timestamps(&self) -> bool {
        self.flags.has_timestamps()
    }

    pub fn format(&self) -> RecordFormat {
        RecordFormat::new(self.flags)
    }

    pub fn record_count(&self) -> u32 {
        self.record_count
    }

    pub fn user_count(&self) -> u32 {
        self.user_count
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn record_size(&self) -> usize {
        self.format().record_size()
    }

    /// record_data_size returns the size in bytes of the record region.
    pub fn record_data_size(&self) -> u64 {
        self.record_count as u64 * self.record_size() as u64
    }

    /// min_file_size returns the smallest file that can hold everything this header declares:
    /// the header, the records and two index tables whose entries own at least one slot each.
    pub fn min_file_size(&self) -> u64 {
        let entry = (INDEX_ENTRY_HEADER_SIZE + INDEX_POSITION_SIZE) as u64;
        HEADER_SIZE as u64
            + self.record_data_size()
            + 2 * INDEX_COUNT_SIZE as u64
            + (self.user_count as u64 + self.item_count as u64) * entry
    }

    /// append_to writes the binary form of the header to `buf`.
    pub fn append_to(&self, buf: &mut impl BufMut) {
        buf.put_u32(MAGIC_NUMBER);
        buf.put_u32(VERSION);
        buf.put_u32(self.flags.bits());
        buf.put_u32(self.record_count);
        buf.put_u32(self.user_count);
        buf.put_u32(self.item_count);
    }

    /// render returns the binary form of the header.
    pub fn render(&self) -> [u8; HEADER_SIZE] {
        let mut b = [0_u8; HEADER_SIZE];
        self.append_to(&mut &mut b[..]);
        b
    }

    /// parse decodes a header from the front of `b`.
    pub fn parse(mut b: &[u8]) -> Result<Self> {
        if b.len() < HEADER_SIZE {
            return Err(Error::truncated(HEADER_SIZE as u64, b.len() as u64));
        }

        let magic = b.get_u32();
        if magic != MAGIC_NUMBER {
            return Err(Error::MalformedHeader(format!(
                "invalid magic number {:#010x}",
                magic
            )));
        }

        let version = b.get_u32();
        if version != VERSION {
            return Err(Error::MalformedHeader(format!(
                "file is version {}, expected {}",
                version, VERSION
            )));
        }

        let bits = b.get_u32();
        let flags = FormatFlags::from_bits(bits)
            .ok_or_else(|| Error::MalformedHeader(format!("unknown format flags {:#x}", bits)))?;

        let record_count = b.get_u32();
        let user_count = b.get_u32();
        let item_count = b.get_u32();

        if record_count > 0 && (user_count == 0 || item_count == 0) {
            return Err(Error::MalformedHeader(format!(
                "{} records declared without users or items",
                record_count
            )));
        }
        if user_count > record_count || item_count > record_count {
            return Err(Error::MalformedHeader(format!(
                "more keys ({} users, {} items) than records ({})",
                user_count, item_count, record_count
            )));
        }

        Ok(Self {
            flags,
            record_count,
            user_count,
            item_count,
        })
    }

    /// read_from reads and validates the header of `file`, checking that the file is large
    /// enough for the content the header declares.
    pub fn read_from(file: &impl RandomAccessFile) -> Result<Self> {
        let len = file.len();
        if len < HEADER_SIZE as u64 {
            return Err(Error::truncated(HEADER_SIZE as u64, len));
        }

        let mut b = [0_u8; HEADER_SIZE];
        file.read(0, &mut b)?;
        let header = Self::parse(&b)?;

        let required = header.min_file_size();
        if len < required {
            return Err(Error::truncated(required, len));
        }

        Ok(header)
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "flags={} records={} users={} items={}",
            self.flags.name(),
            self.record_count,
            self.user_count,
            self.item_count
        )
    }
}

#[cfg(test)]
mod tests {
    use ratingpack_storage::memory::MemoryFile;

    use crate::error::Error;
    use crate::format::header::Header;
    use crate::format::{FormatFlags, HEADER_SIZE};

    #[test]
    fn test_render_parse() {
        let header = Header::new(FormatFlags::TIMESTAMPS, 3, 2, 2);
        let b = header.render();
        assert_eq!(b.len(), HEADER_SIZE);
        assert_eq!(&b[..4], b"RPK1");
        assert_eq!(&b[8..12], &[0, 0, 0, 1]);

        let parsed = Header::parse(&b).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.record_size(), 32);
        assert_eq!(parsed.record_data_size(), 96);
        assert_eq!(parsed.to_string(), "flags=TIMESTAMPS records=3 users=2 items=2");
    }

    #[test]
    fn test_bad_magic() {
        let mut b = Header::empty(FormatFlags::empty()).render();
        b[0] = b'X';
        assert!(matches!(Header::parse(&b), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_bad_version() {
        let mut b = Header::empty(FormatFlags::empty()).render();
        b[7] = 9;
        assert!(matches!(Header::parse(&b), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_unknown_flags() {
        let mut b = Header::empty(FormatFlags::empty()).render();
        b[11] = 0b10;
        assert!(matches!(Header::parse(&b), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_inconsistent_counts() {
        let b = Header::new(FormatFlags::empty(), 2, 3, 1).render();
        assert!(matches!(Header::parse(&b), Err(Error::MalformedHeader(_))));

        let b = Header::new(FormatFlags::empty(), 2, 0, 1).render();
        assert!(matches!(Header::parse(&b), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_short_buffer() {
        let b = Header::empty(FormatFlags::empty()).render();
        assert!(matches!(
            Header::parse(&b[..10]),
            Err(Error::TruncatedFile {
                expected: 24,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_read_from_truncated_file() {
        let header = Header::new(FormatFlags::empty(), 10, 2, 2);
        let mut data = header.render().to_vec();
        data.extend_from_slice(&[0_u8; 100]);

        let err = Header::read_from(&MemoryFile::new(data)).unwrap_err();
        assert!(matches!(err, Error::TruncatedFile { actual: 124, .. }));
    }

    #[test]
    fn test_read_from_empty_file() {
        let header = Header::empty(FormatFlags::empty());
        let mut data = header.render().to_vec();
        data.extend_from_slice(&[0_u8; 8]);

        assert_eq!(Header::read_from(&MemoryFile::new(data)).unwrap(), header);
    }
}
