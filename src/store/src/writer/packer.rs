use std::borrow::Borrow;
use std::collections::HashMap;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use common_base::rating::Rating;
use ratingpack_storage::file::writable_file::WritableFile;
use ratingpack_storage::Writable;

use crate::error::{Error, Result};
use crate::format::header::Header;
use crate::format::record::RecordFormat;
use crate::format::{FormatFlags, HEADER_SIZE};
use crate::index::writer::IndexTableWriter;
use crate::writer::PackOptions;

/// RatingPacker writes a stream of ratings into a packed rating file.
///
/// A zeroed placeholder header (no magic number) is written on construction and the real one
/// is patched in by `close`, so a file that was never closed fails to open with
/// `MalformedHeader`.  Without timestamps, records are appended as
/// they arrive.  With timestamps every rating is held in memory until `close`, where they are
/// stably sorted by timestamp and written in that order.
///
/// The packer is single-writer; callers sequence all calls.
pub struct RatingPacker<W: Writable = WritableFile> {
    w: Option<W>,
    format: RecordFormat,
    buf: BytesMut,

    // slots written so far
    n: u32,
    user_index: HashMap<u64, Vec<u32>>,
    item_index: HashMap<u64, Vec<u32>>,

    // ratings awaiting the timestamp sort
    pending: Vec<Rating>,

    dropped_timestamps: bool,
    closed: bool,
}

impl RatingPacker<WritableFile> {
    /// open creates (or truncates) the file at `path` and returns a packer writing to it.
    pub fn open(path: impl AsRef<Path>, flags: FormatFlags) -> Result<Self> {
        let f = WritableFile::create(path)?;
        Self::new(f, flags)
    }

    pub fn open_with(path: impl AsRef<Path>, options: PackOptions) -> Result<Self> {
        Self::open(path, options.flags)
    }
}

impl<W: Writable> RatingPacker<W> {
    /// new returns a packer writing to `w`, which must be empty.
    pub fn new(mut w: W, flags: FormatFlags) -> Result<Self> {
        if w.size() != 0 {
            return Err(Error::IllegalState(format!(
                "packer output already holds {} bytes",
                w.size()
            )));
        }

        w.write_bytes(&[0_u8; HEADER_SIZE])?;

        let format = RecordFormat::new(flags);
        Ok(Self {
            w: Some(w),
            format,
            buf: BytesMut::with_capacity(format.record_size()),
            n: 0,
            user_index: HashMap::new(),
            item_index: HashMap::new(),
            pending: Vec::new(),
            dropped_timestamps: false,
            closed: false,
        })
    }

    pub fn flags(&self) -> FormatFlags {
        self.format.flags()
    }

    /// rating_count returns the number of ratings accepted so far.
    pub fn rating_count(&self) -> u64 {
        self.n as u64 + self.pending.len() as u64
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// write_rating adds one rating to the file.
    pub fn write_rating(&mut self, rating: &Rating) -> Result<()> {
        if self.closed {
            return Err(Error::IllegalState("packer is closed".to_string()));
        }
        if self.rating_count() >= u32::MAX as u64 {
            return Err(Error::IllegalState(format!(
                "packer is full: at most {} ratings per file",
                u32::MAX
            )));
        }

        if self.format.has_timestamps() {
            if rating.timestamp.is_none() {
                return Err(Error::InvalidData(format!(
                    "rating of item {} by user {} has no timestamp",
                    rating.item, rating.user
                )));
            }
            self.pending.push(*rating);
            return Ok(());
        }

        if rating.timestamp.is_some() && !self.dropped_timestamps {
            warn!("file is packed without timestamps, dropping rating timestamps");
            self.dropped_timestamps = true;
        }
        self.append_record(rating)
    }

    /// write_ratings adds every rating of `ratings`, in order.
    pub fn write_ratings<I>(&mut self, ratings: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Borrow<Rating>,
    {
        for r in ratings {
            self.write_rating(r.borrow())?;
        }
        Ok(())
    }

    /// close finalizes the file and releases the output.  Closing again does nothing.
    ///
    /// The output is released even when finalizing fails; the file is then left incomplete.
    pub fn close(&mut self) -> Result<()> {
        let result = self.finalize();
        self.w = None;
        result
    }

    /// finish finalizes the file and returns the output it was written to.
    pub fn finish(mut self) -> Result<W> {
        self.finalize()?;
        self.w
            .take()
            .ok_or_else(|| Error::IllegalState("packer is closed".to_string()))
    }

    fn append_record(&mut self, rating: &Rating) -> Result<()> {
        let w = self
            .w
            .as_mut()
            .ok_or_else(|| Error::IllegalState("packer is closed".to_string()))?;

        self.buf.clear();
        self.format.encode(rating, &mut self.buf)?;
        w.write_bytes(&self.buf)?;

        let slot = self.n;
        self.user_index.entry(rating.user).or_default().push(slot);
        self.item_index.entry(rating.item).or_default().push(slot);
        self.n += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut pending = std::mem::take(&mut self.pending);
        // stable, so ratings with equal timestamps keep their write order
        pending.sort_by_key(|r| r.timestamp);
        for r in &pending {
            self.append_record(r)?;
        }
        drop(pending);

        let header = Header::new(
            self.format.flags(),
            self.n,
            self.user_index.len() as u32,
            self.item_index.len() as u32,
        );

        let w = self
            .w
            .as_mut()
            .ok_or_else(|| Error::IllegalState("packer is closed".to_string()))?;

        let user_size = write_index(w, std::mem::take(&mut self.user_index))?;
        let item_size = write_index(w, std::mem::take(&mut self.item_index))?;
        w.write_at(0, &header.render())?;
        w.sync()?;

        info!(
            "packed {} ({} bytes, user index {} bytes, item index {} bytes)",
            header,
            w.size(),
            user_size,
            item_size
        );
        Ok(())
    }
}

impl<W: Writable> Drop for RatingPacker<W> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            warn!("failed to close rating packer: {}", e);
        }
    }
}

/// write_index writes the table for one key space in ascending key order.
fn write_index<W: Writable>(w: &mut W, index: HashMap<u64, Vec<u32>>) -> Result<u64> {
    let mut entries: Vec<(u64, Vec<u32>)> = index.into_iter().collect();
    entries.sort_unstable_by_key(|(key, _)| *key);

    let mut tw = IndexTableWriter::new(entries.len() as u32);
    for (key, positions) in &entries {
        tw.write_entry(*key, positions)?;
    }
    tw.write_to(w)
}

/// pack_to_bytes packs `ratings` into an in-memory file.
pub fn pack_to_bytes<I>(ratings: I, flags: FormatFlags) -> Result<Bytes>
where
    I: IntoIterator,
    I::Item: Borrow<Rating>,
{
    let mut packer = RatingPacker::new(Vec::<u8>::new(), flags)?;
    packer.write_ratings(ratings)?;
    let buf = packer.finish()?;
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use bytes::Buf;
    use common_base::rating::Rating;

    use crate::error::Error;
    use crate::format::header::Header;
    use crate::format::{FormatFlags, BASE_RECORD_SIZE, HEADER_SIZE, TIMESTAMPED_RECORD_SIZE};
    use crate::writer::packer::{pack_to_bytes, RatingPacker};

    #[test]
    fn test_empty() {
        let b = pack_to_bytes(Vec::<Rating>::new(), FormatFlags::empty()).unwrap();
        assert_eq!(b.len(), HEADER_SIZE + 8);

        let header = Header::parse(&b).unwrap();
        assert_eq!(header, Header::empty(FormatFlags::empty()));
    }

    #[test]
    fn test_arrival_order() {
        let ratings = vec![
            Rating::new(42, 105, 3.5),
            Rating::new(42, 120, 2.5),
            Rating::new(39, 120, 4.5),
        ];
        let b = pack_to_bytes(&ratings, FormatFlags::empty()).unwrap();

        let header = Header::parse(&b).unwrap();
        assert_eq!(header.record_count(), 3);
        assert_eq!(header.user_count(), 2);
        assert_eq!(header.item_count(), 2);

        let format = header.format();
        let region = &b[HEADER_SIZE..HEADER_SIZE + 3 * BASE_RECORD_SIZE];
        for (slot, r) in ratings.iter().enumerate() {
            assert_eq!(&format.read_slot(region, slot), r);
        }

        // user table: 39 -> [2], 42 -> [0, 1]
        let mut tables = &b[HEADER_SIZE + 3 * BASE_RECORD_SIZE..];
        assert_eq!(tables.get_u32(), 2);
        assert_eq!(tables.get_u64(), 39);
        assert_eq!(tables.get_u32(), 1);
        assert_eq!(tables.get_u32(), 2);
        assert_eq!(tables.get_u64(), 42);
        assert_eq!(tables.get_u32(), 2);
        assert_eq!(tables.get_u32(), 0);
        assert_eq!(tables.get_u32(), 1);
    }

    #[test]
    fn test_timestamp_order() {
        let ratings = vec![
            Rating::with_timestamp(39, 120, 4.5, 120),
            Rating::with_timestamp(42, 105, 3.5, 100),
            Rating::with_timestamp(7, 1, 1.0, 110),
            Rating::with_timestamp(42, 120, 2.5, 110),
        ];
        let b = pack_to_bytes(&ratings, FormatFlags::TIMESTAMPS).unwrap();

        let header = Header::parse(&b).unwrap();
        assert!(header.has_timestamps());
        assert_eq!(header.record_count(), 4);

        let format = header.format();
        let region = &b[HEADER_SIZE..HEADER_SIZE + 4 * TIMESTAMPED_RECORD_SIZE];
        let stored: Vec<Rating> = (0..4).map(|i| format.read_slot(region, i)).collect();
        assert_eq!(
            stored,
            vec![ratings[1], ratings[2], ratings[3], ratings[0]]
        );
    }

    #[test]
    fn test_missing_timestamp() {
        let mut packer = RatingPacker::new(Vec::<u8>::new(), FormatFlags::TIMESTAMPS).unwrap();
        let err = packer.write_rating(&Rating::new(1, 2, 3.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
        assert_eq!(packer.rating_count(), 0);
    }

    #[test]
    fn test_dropped_timestamp() {
        let b = pack_to_bytes(
            [Rating::with_timestamp(1, 2, 3.0, 99)],
            FormatFlags::empty(),
        )
        .unwrap();

        let header = Header::parse(&b).unwrap();
        let r = header.format().decode(&b[HEADER_SIZE..]);
        assert_eq!(r, Rating::new(1, 2, 3.0));
    }

    #[test]
    fn test_write_after_close() {
        let mut packer = RatingPacker::new(Vec::<u8>::new(), FormatFlags::empty()).unwrap();
        packer.write_rating(&Rating::new(1, 2, 3.0)).unwrap();
        packer.close().unwrap();
        packer.close().unwrap();
        assert!(packer.is_closed());

        let err = packer.write_rating(&Rating::new(1, 2, 3.0)).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_non_empty_output() {
        let err = RatingPacker::new(vec![1_u8], FormatFlags::empty())
            .err()
            .unwrap();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_unclosed_output_has_no_header() {
        let mut packer = RatingPacker::new(Vec::<u8>::new(), FormatFlags::empty()).unwrap();
        packer.write_rating(&Rating::new(0, 1, 1.0)).unwrap();

        let w = packer.w.as_ref().unwrap();
        assert_eq!(&w[..HEADER_SIZE], &[0_u8; HEADER_SIZE]);
        assert!(matches!(
            Header::parse(w),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.pack");

        let mut packer = RatingPacker::open(&path, FormatFlags::empty()).unwrap();
        packer
            .write_ratings([Rating::new(1, 2, 3.0), Rating::new(2, 2, 4.0)])
            .unwrap();
        packer.close().unwrap();

        let b = std::fs::read(&path).unwrap();
        assert_eq!(Header::parse(&b).unwrap().record_count(), 2);
    }

    #[test]
    fn test_close_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.pack");

        {
            let mut packer = RatingPacker::open(&path, FormatFlags::TIMESTAMPS).unwrap();
            packer
                .write_rating(&Rating::with_timestamp(1, 2, 3.0, 10))
                .unwrap();
        }

        let b = std::fs::read(&path).unwrap();
        assert_eq!(Header::parse(&b).unwrap().record_count(), 1);
    }
}
