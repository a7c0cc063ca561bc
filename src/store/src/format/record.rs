use bytes::{Buf, BufMut};
use common_base::rating::Rating;

use crate::error::{Error, Result};
use crate::format::{FormatFlags, BASE_RECORD_SIZE, TIMESTAMPED_RECORD_SIZE};

/// RecordFormat encodes and decodes the fixed width records of a packed rating file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordFormat {
    flags: FormatFlags,
}

impl RecordFormat {
    pub fn new(flags: FormatFlags) -> Self {
        Self { flags }
    }

    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    pub fn has_timestamps(&self) -> bool {
        self.flags.has_timestamps()
    }

    /// record_size returns the encoded width of one record in bytes.
    pub fn record_size(&self) -> usize {
        if self.has_timestamps() {
            TIMESTAMPED_RECORD_SIZE
        } else {
            BASE_RECORD_SIZE
        }
    }

    /// encode appends exactly `record_size()` bytes for `rating` to `buf`.
    ///
    /// Without the TIMESTAMPS flag any timestamp on the rating is not stored.  With it, a
    /// rating lacking a timestamp cannot be encoded.
    pub fn encode(&self, rating: &Rating, buf: &mut impl BufMut) -> Result<()> {
        let timestamp = if self.has_timestamps() {
            let ts = rating.timestamp.ok_or_else(|| {
                Error::InvalidData(format!(
                    "rating of item {} by user {} has no timestamp",
                    rating.item, rating.user
                ))
            })?;
            Some(ts)
        } else {
            None
        };

        buf.put_u64(rating.user);
        buf.put_u64(rating.item);
        buf.put_u64(rating.value.to_bits());
        if let Some(ts) = timestamp {
            buf.put_u64(ts);
        }

        Ok(())
    }

    /// decode reads one record from the front of `b`, which must hold at least
    /// `record_size()` bytes.
    pub fn decode(&self, mut b: &[u8]) -> Rating {
        debug_assert!(b.len() >= self.record_size());

        let user = b.get_u64();
        let item = b.get_u64();
        let value = f64::from_bits(b.get_u64());
        let timestamp = if self.has_timestamps() {
            Some(b.get_u64())
        } else {
            None
        };

        Rating {
            user,
            item,
            value,
            timestamp,
        }
    }

    /// read_slot decodes the record stored at `slot` of a record region.
    pub fn read_slot(&self, region: &[u8], slot: usize) -> Rating {
        let offset = slot * self.record_size();
        self.decode(&region[offset..offset + self.record_size()])
    }

    /// read_timestamp returns the timestamp of the record at `slot` without decoding the
    /// rest of it, or `None` for formats without timestamps.
    pub fn read_timestamp(&self, region: &[u8], slot: usize) -> Option<u64> {
        if !self.has_timestamps() {
            return None;
        }

        let offset = slot * self.record_size() + BASE_RECORD_SIZE;
        let mut b = &region[offset..offset + 8];
        Some(b.get_u64())
    }

    /// read_user returns the user id of the record at `slot`.
    pub(crate) fn read_user(&self, region: &[u8], slot: usize) -> u64 {
        let offset = slot * self.record_size();
        let mut b = &region[offset..offset + 8];
        b.get_u64()
    }

    /// read_item returns the item id of the record at `slot`.
    pub(crate) fn read_item(&self, region: &[u8], slot: usize) -> u64 {
        let offset = slot * self.record_size() + 8;
        let mut b = &region[offset..offset + 8];
        b.get_u64()
    }
}

#[cfg(test)]
mod tests {
    use common_base::rating::Rating;

    use crate::error::Error;
    use crate::format::record::RecordFormat;
    use crate::format::FormatFlags;

    #[test]
    fn test_encode_without_timestamps() {
        let format = RecordFormat::new(FormatFlags::empty());
        assert_eq!(format.record_size(), 24);

        let mut buf = Vec::new();
        format
            .encode(&Rating::with_timestamp(42, 105, 3.5, 100), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), 24);
        assert_eq!(&buf[..8], &42_u64.to_be_bytes());
        assert_eq!(&buf[8..16], &105_u64.to_be_bytes());
        assert_eq!(&buf[16..24], &3.5_f64.to_bits().to_be_bytes());

        // the timestamp is not stored
        assert_eq!(format.decode(&buf), Rating::new(42, 105, 3.5));
        assert_eq!(format.read_timestamp(&buf, 0), None);
    }

    #[test]
    fn test_encode_with_timestamps() {
        let format = RecordFormat::new(FormatFlags::TIMESTAMPS);
        assert_eq!(format.record_size(), 32);

        let ratings = [
            Rating::with_timestamp(42, 105, 3.5, 100),
            Rating::with_timestamp((1 << 31) + 100, u64::MAX, std::f64::consts::PI, 23049),
        ];

        let mut buf = Vec::new();
        for r in &ratings {
            format.encode(r, &mut buf).unwrap();
        }
        assert_eq!(buf.len(), 64);

        assert_eq!(format.read_slot(&buf, 0), ratings[0]);
        assert_eq!(format.read_slot(&buf, 1), ratings[1]);
        assert_eq!(format.read_timestamp(&buf, 1), Some(23049));
        assert_eq!(format.read_user(&buf, 1), (1 << 31) + 100);
        assert_eq!(format.read_item(&buf, 1), u64::MAX);
    }

    #[test]
    fn test_unrate_survives() {
        let format = RecordFormat::new(FormatFlags::TIMESTAMPS);
        let unrate = Rating::unrate(1, 2, Some(7));

        let mut buf = Vec::new();
        format.encode(&unrate, &mut buf).unwrap();
        let decoded = format.decode(&buf);
        assert!(!decoded.has_value());
        assert_eq!(decoded, unrate);
    }

    #[test]
    fn test_missing_timestamp() {
        let format = RecordFormat::new(FormatFlags::TIMESTAMPS);
        let mut buf = Vec::new();
        let err = format.encode(&Rating::new(1, 2, 3.0), &mut buf).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
        assert!(buf.is_empty());
    }
}
