//! Transport of a rating store through a byte stream.
//!
//! A mapped store cannot be moved across a process boundary as-is, so it is exported as a
//! self-describing stream and imported into a store over owned bytes.
//!
//! ┌─────────────┬────────┬───────────┬───────────┬─────────┬───────────┬─────────┬───────────┐
//! │ Header Size │ Header │User Index │Item Index │  Limit  │   Limit   │  Data   │   Data    │
//! │             │        │           │           │  Index  │ Timestamp │ Length  │           │
//! │   4 bytes   │24 bytes│  N bytes  │  N bytes  │ 4 bytes │  8 bytes  │ 8 bytes │  N bytes  │
//! └─────────────┴────────┴───────────┴───────────┴─────────┴───────────┴─────────┴───────────┘
//!
//! Index tables use the file format and hold only the slots visible through the store.  A
//! limit timestamp of `u64::MAX` means the store is not windowed.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::format::header::Header;
use crate::format::HEADER_SIZE;
use crate::index::table::IndexTable;
use crate::reader::store::{check_coverage, PackedRatingStore};

/// Size of the pieces the record data is copied in.
const CHUNK_SIZE: usize = 4096;

impl PackedRatingStore {
    /// write_to exports the store to `w` and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<u64> {
        let mut n = 0_u64;

        let header = self.header().render();
        w.write_u32::<BigEndian>(header.len() as u32)?;
        w.write_all(&header)?;
        n += 4 + header.len() as u64;

        for table in [self.user_table(), self.item_table()] {
            let b = table.encode()?;
            w.write_all(&b)?;
            n += b.len() as u64;
        }

        let data = self.data();
        w.write_u32::<BigEndian>(self.limit_index())?;
        w.write_u64::<BigEndian>(self.raw_limit_timestamp())?;
        w.write_u64::<BigEndian>(data.len() as u64)?;
        n += 4 + 8 + 8;

        for chunk in data.chunks(CHUNK_SIZE) {
            w.write_all(chunk)?;
        }
        n += data.len() as u64;

        debug!("exported {} records in {} bytes", self.len(), n);
        Ok(n)
    }

    /// read_from imports a store exported by `write_to`.  The store owns its bytes and has no
    /// backing file.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let eof = |e| Error::eof_as_invalid(e, "rating store");

        let header_size = r.read_u32::<BigEndian>().map_err(eof)?;
        if header_size as usize != HEADER_SIZE {
            return Err(Error::InvalidData(format!(
                "header size {} does not match expected {}",
                header_size, HEADER_SIZE
            )));
        }

        let mut b = [0_u8; HEADER_SIZE];
        r.read_exact(&mut b).map_err(eof)?;
        let header = Header::parse(&b)?;

        let user_table = IndexTable::read_from(r)?;
        let item_table = IndexTable::read_from(r)?;

        let limit_index = r.read_u32::<BigEndian>().map_err(eof)?;
        let limit_timestamp = r.read_u64::<BigEndian>().map_err(eof)?;
        let data_len = r.read_u64::<BigEndian>().map_err(eof)?;

        if limit_index > header.record_count() {
            return Err(Error::InvalidData(format!(
                "limit {} exceeds the {} records of the file",
                limit_index,
                header.record_count()
            )));
        }
        let expected = limit_index as u64 * header.record_size() as u64;
        if data_len != expected {
            return Err(Error::InvalidData(format!(
                "record data is {} bytes, {} expected for {} records",
                data_len, expected, limit_index
            )));
        }

        let mut data = BytesMut::new();
        let mut chunk = [0_u8; CHUNK_SIZE];
        let mut remaining = data_len as usize;
        while remaining > 0 {
            let size = remaining.min(CHUNK_SIZE);
            r.read_exact(&mut chunk[..size]).map_err(eof)?;
            data.extend_from_slice(&chunk[..size]);
            remaining -= size;
        }

        check_coverage("user", &user_table, limit_index)?;
        check_coverage("item", &item_table, limit_index)?;

        debug!("imported {} records ({})", limit_index, header);
        Ok(PackedRatingStore::from_parts(
            header,
            data.freeze(),
            user_table,
            item_table,
            limit_index,
            limit_timestamp,
        ))
    }

    /// serialize exports the store into a new buffer.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// deserialize imports a store from a buffer produced by `serialize`.
    pub fn deserialize(b: &[u8]) -> Result<Self> {
        let mut r = b;
        Self::read_from(&mut r)
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{BigEndian, WriteBytesExt};
    use common_base::order::SortOrder;
    use common_base::rating::Rating;

    use crate::error::Error;
    use crate::format::header::Header;
    use crate::format::{FormatFlags, HEADER_SIZE};
    use crate::index::writer::IndexTableWriter;
    use crate::reader::store::PackedRatingStore;
    use crate::writer::packer::pack_to_bytes;

    fn store(flags: FormatFlags) -> PackedRatingStore {
        let ratings = vec![
            Rating::with_timestamp(42, 105, 3.5, 100),
            Rating::with_timestamp(42, 120, 2.5, 110),
            Rating::with_timestamp((1 << 31) + 100, 120, 4.5, 120),
        ];
        PackedRatingStore::from_buffer(pack_to_bytes(ratings, flags).unwrap()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let s = store(FormatFlags::TIMESTAMPS);
        let b = s.serialize().unwrap();
        let copy = PackedRatingStore::deserialize(&b).unwrap();

        assert_eq!(copy.header(), s.header());
        assert_eq!(copy.user_ids(), s.user_ids());
        assert_eq!(copy.item_ids(), s.item_ids());
        assert_eq!(copy.limit_timestamp(), None);
        assert!(copy.path().is_none());
        assert_eq!(
            copy.stream_events(SortOrder::Any).collect::<Vec<_>>(),
            s.stream_events(SortOrder::Any).collect::<Vec<_>>()
        );
        assert_eq!(
            copy.events_for_user((1 << 31) + 100),
            s.events_for_user((1 << 31) + 100)
        );
    }

    #[test]
    fn test_windowed_round_trip() {
        let s = store(FormatFlags::TIMESTAMPS).create_windowed_view(110).unwrap();
        let copy = PackedRatingStore::deserialize(&s.serialize().unwrap()).unwrap();

        assert_eq!(copy.len(), 1);
        assert_eq!(copy.limit_timestamp(), Some(110));
        assert_eq!(copy.user_ids(), &[42]);
        assert_eq!(copy.item_ids(), &[105]);
        assert!(copy.events_for_item(120).is_none());

        // the copy narrows further like its source
        let narrower = copy.create_windowed_view(100).unwrap();
        assert!(narrower.is_empty());
    }

    #[test]
    fn test_slot_listed_twice() {
        let mut b = Vec::new();
        let header = Header::new(FormatFlags::empty(), 2, 2, 2);
        b.write_u32::<BigEndian>(HEADER_SIZE as u32).unwrap();
        b.extend_from_slice(&header.render());

        let mut users = IndexTableWriter::new(2);
        users.write_entry(1, &[0]).unwrap();
        users.write_entry(2, &[1]).unwrap();
        b.extend_from_slice(&users.finish().unwrap());

        // slot 0 belongs to both items
        let mut items = IndexTableWriter::new(2);
        items.write_entry(10, &[0, 1]).unwrap();
        items.write_entry(11, &[0]).unwrap();
        b.extend_from_slice(&items.finish().unwrap());

        b.write_u32::<BigEndian>(2).unwrap();
        b.write_u64::<BigEndian>(u64::MAX).unwrap();
        b.write_u64::<BigEndian>(2 * 24).unwrap();
        for r in [Rating::new(1, 10, 1.0), Rating::new(2, 10, 2.0)] {
            header.format().encode(&r, &mut b).unwrap();
        }

        assert!(matches!(
            PackedRatingStore::deserialize(&b),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_header_size() {
        let mut b = store(FormatFlags::empty()).serialize().unwrap();
        (&mut b[..4]).write_u32::<BigEndian>(20).unwrap();
        assert!(matches!(
            PackedRatingStore::deserialize(&b),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let b = store(FormatFlags::empty()).serialize().unwrap();
        for len in [0, 3, 20, b.len() / 2, b.len() - 1] {
            assert!(matches!(
                PackedRatingStore::deserialize(&b[..len]),
                Err(Error::InvalidData(_))
            ));
        }
    }
}
