use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use common_base::order::SortOrder;
use common_base::rating::Rating;
use common_base::source::{ItemRatingSource, RatingSource, UserRatingSource};
use ratingpack_storage::memory::MemoryFile;
use ratingpack_storage::mmap::MmapReadableFile;
use ratingpack_storage::RandomAccessFile;
use ratingpack_utils::search::lower_bound;

use crate::error::{Error, Result};
use crate::format::header::Header;
use crate::format::HEADER_SIZE;
use crate::index::table::IndexTable;
use crate::reader::list::{ItemEvents, RatingList, UserHistory};
use crate::reader::stream::{ItemEventStream, UserHistories};
use crate::reader::ReadOptions;
use crate::stat::StoreDescription;

/// PackedRatingStore answers queries over a packed rating file.
///
/// The store is immutable.  Every query slices its own view of the shared record region, so a
/// store may be queried from many threads at once and clones are cheap.  Views created with
/// `create_windowed_view` share the same bytes and only see the records before their cutoff.
#[derive(Clone)]
pub struct PackedRatingStore {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
    header: Header,

    // record region limited to the first `limit_index` records
    data: Bytes,
    user_table: IndexTable,
    item_table: IndexTable,

    limit_index: u32,
    // u64::MAX when unbounded
    limit_timestamp: u64,
}

impl PackedRatingStore {
    /// open memory-maps the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let f = MmapReadableFile::open(path)?;
        Self::from_file(&f, options)
    }

    /// from_buffer opens a packed rating file that is already resident in memory.
    pub fn from_buffer(buf: impl Into<Bytes>) -> Result<Self> {
        Self::from_buffer_with(buf, ReadOptions::default())
    }

    pub fn from_buffer_with(buf: impl Into<Bytes>, options: ReadOptions) -> Result<Self> {
        Self::from_file(&MemoryFile::new(buf), options)
    }

    /// from_file parses the header and both index tables of `f`.  Records stay in `f`'s bytes
    /// and are decoded on demand.
    pub fn from_file(f: &impl RandomAccessFile, options: ReadOptions) -> Result<Self> {
        let header = Header::read_from(f)?;

        let bytes = f.bytes();
        let record_end = HEADER_SIZE + header.record_data_size() as usize;
        let data = bytes.slice(HEADER_SIZE..record_end);

        let mut tables = bytes.slice(record_end..);
        let user_table = IndexTable::from_buffer(header.user_count(), &mut tables)?;
        let item_table = IndexTable::from_buffer(header.item_count(), &mut tables)?;
        if !tables.is_empty() {
            warn!(
                "ignoring {} trailing bytes after the item index",
                tables.len()
            );
        }

        let n = header.record_count();
        check_coverage("user", &user_table, n)?;
        check_coverage("item", &item_table, n)?;

        let store = Self {
            path: f.path().map(Path::to_path_buf),
            modified: f.modified(),
            header,
            data,
            user_table,
            item_table,
            limit_index: n,
            limit_timestamp: u64::MAX,
        };

        if options.verify {
            store.verify()?;
        }

        info!(
            "opened rating store {} ({})",
            store
                .path
                .as_deref()
                .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string()),
            header
        );
        Ok(store)
    }

    /// from_parts assembles a store from already validated parts.
    pub(crate) fn from_parts(
        header: Header,
        data: Bytes,
        user_table: IndexTable,
        item_table: IndexTable,
        limit_index: u32,
        limit_timestamp: u64,
    ) -> Self {
        Self {
            path: None,
            modified: None,
            header,
            data,
            user_table,
            item_table,
            limit_index,
            limit_timestamp,
        }
    }

    /// header returns the header of the underlying file.  Its counts describe the whole file,
    /// not a windowed view.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn has_timestamps(&self) -> bool {
        self.header.has_timestamps()
    }

    /// len returns the number of records visible through this store.
    pub fn len(&self) -> usize {
        self.limit_index as usize
    }

    pub fn is_empty(&self) -> bool {
        self.limit_index == 0
    }

    /// limit_timestamp returns the windowing cutoff, or `None` if the store is unbounded.
    pub fn limit_timestamp(&self) -> Option<u64> {
        (self.limit_timestamp != u64::MAX).then_some(self.limit_timestamp)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// user_ids returns the users with at least one visible record, ascending.
    pub fn user_ids(&self) -> &[u64] {
        self.user_table.keys()
    }

    /// item_ids returns the items with at least one visible record, ascending.
    pub fn item_ids(&self) -> &[u64] {
        self.item_table.keys()
    }

    /// ratings returns every visible record in physical order.
    pub fn ratings(&self) -> RatingList {
        RatingList::range(self.header.format(), self.data.clone(), 0..self.limit_index)
    }

    /// events_for_user returns the user's records in physical order, or `None` if the user
    /// is unknown.
    pub fn events_for_user(&self, user: u64) -> Option<UserHistory> {
        let positions = self.user_table.entry(user)?;
        Some(UserHistory {
            user,
            ratings: RatingList::run(self.header.format(), self.data.clone(), positions),
        })
    }

    /// events_for_item returns the item's records in physical order, or `None` if the item
    /// is unknown.
    pub fn events_for_item(&self, item: u64) -> Option<ItemEvents> {
        let positions = self.item_table.entry(item)?;
        Some(ItemEvents {
            item,
            ratings: RatingList::run(self.header.format(), self.data.clone(), positions),
        })
    }

    /// users_for_item returns the users who rated `item`, or `None` if the item is unknown.
    pub fn users_for_item(&self, item: u64) -> Option<BTreeSet<u64>> {
        let format = self.header.format();
        let positions = self.item_table.entry(item)?;
        Some(
            positions
                .iter()
                .map(|slot| format.read_user(&self.data, slot as usize))
                .collect(),
        )
    }

    /// items_for_user returns the items `user` rated, or `None` if the user is unknown.
    pub fn items_for_user(&self, user: u64) -> Option<BTreeSet<u64>> {
        let format = self.header.format();
        let positions = self.user_table.entry(user)?;
        Some(
            positions
                .iter()
                .map(|slot| format.read_item(&self.data, slot as usize))
                .collect(),
        )
    }

    /// stream_events streams every visible record.
    ///
    /// `Any` and `Timestamp` yield physical order, which is timestamp order for files packed
    /// with timestamps.  `User` and `Item` yield records grouped by key, keys ascending, each
    /// group in physical order.
    pub fn stream_events(&self, order: SortOrder) -> Box<dyn Iterator<Item = Rating> + Send> {
        match order {
            SortOrder::Any | SortOrder::Timestamp => Box::new(self.ratings().into_iter()),
            SortOrder::User => Box::new(self.stream_events_by_user().flat_map(|h| h.ratings)),
            SortOrder::Item => Box::new(self.stream_events_by_item().flat_map(|e| e.ratings)),
        }
    }

    /// stream_events_by_user streams each user's history, users ascending.
    pub fn stream_events_by_user(&self) -> UserHistories {
        UserHistories::new(
            self.header.format(),
            self.data.clone(),
            self.user_table.clone().into_iter(),
        )
    }

    /// stream_events_by_item streams each item's events, items ascending.
    pub fn stream_events_by_item(&self) -> ItemEventStream {
        ItemEventStream::new(
            self.header.format(),
            self.data.clone(),
            self.item_table.clone().into_iter(),
        )
    }

    /// create_windowed_view returns a view holding only the records with a timestamp before
    /// `timestamp`.
    ///
    /// The cutoff is found by binary search, so the records must be in timestamp order.  Files
    /// written by the packer always are; for files from elsewhere, open with
    /// `ReadOptions::verify` to have the order checked.  Files without timestamps cannot be
    /// windowed.  A cutoff at or past the current one returns an equivalent view.
    ///
    /// `u64::MAX` marks an unbounded store, so windowing at `u64::MAX` keeps every record,
    /// including records stamped `u64::MAX`.
    pub fn create_windowed_view(&self, timestamp: u64) -> Result<Self> {
        if !self.has_timestamps() {
            return Err(Error::IllegalState(
                "cannot window a rating file packed without timestamps".to_string(),
            ));
        }
        if timestamp >= self.limit_timestamp {
            return Ok(self.clone());
        }

        let format = self.header.format();
        let limit = lower_bound(self.limit_index as usize, |slot| {
            timestamp.cmp(&format.read_timestamp(&self.data, slot).unwrap_or_default())
        }) as u32;

        debug!(
            "windowing at timestamp {}: {} of {} records",
            timestamp, limit, self.limit_index
        );

        Ok(Self {
            path: self.path.clone(),
            modified: self.modified,
            header: self.header,
            data: self
                .data
                .slice(..limit as usize * format.record_size()),
            user_table: self.user_table.create_limited_view(limit),
            item_table: self.item_table.create_limited_view(limit),
            limit_index: limit,
            limit_timestamp: timestamp,
        })
    }

    /// describe returns a diagnostic description of the store.
    pub fn describe(&self) -> StoreDescription {
        StoreDescription::new(self.path.clone(), self.modified, self.header)
    }

    pub(crate) fn data(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn user_table(&self) -> &IndexTable {
        &self.user_table
    }

    pub(crate) fn item_table(&self) -> &IndexTable {
        &self.item_table
    }

    pub(crate) fn limit_index(&self) -> u32 {
        self.limit_index
    }

    pub(crate) fn raw_limit_timestamp(&self) -> u64 {
        self.limit_timestamp
    }

    fn verify(&self) -> Result<()> {
        let format = self.header.format();
        let n = self.limit_index as usize;

        if format.has_timestamps() {
            let mut prev = 0;
            for slot in 0..n {
                let ts = format.read_timestamp(&self.data, slot).unwrap_or_default();
                if ts < prev {
                    return Err(Error::InvalidData(format!(
                        "record {} has timestamp {} after {}",
                        slot, ts, prev
                    )));
                }
                prev = ts;
            }
        }

        verify_keys("user", &self.user_table, n, |slot| {
            format.read_user(&self.data, slot)
        })?;
        verify_keys("item", &self.item_table, n, |slot| {
            format.read_item(&self.data, slot)
        })
    }
}

/// check_coverage rejects tables that refer to slots past the records, or whose runs cannot
/// cover every record once.
pub(crate) fn check_coverage(what: &str, table: &IndexTable, n: u32) -> Result<()> {
    table.check_positions(n)?;

    let total = table.position_count();
    if total != n as u64 {
        return Err(Error::InvalidData(format!(
            "{} index covers {} slots, file holds {} records",
            what, total, n
        )));
    }
    Ok(())
}

fn verify_keys<F>(what: &str, table: &IndexTable, n: usize, key_at: F) -> Result<()>
where
    F: Fn(usize) -> u64,
{
    let mut seen = vec![false; n];
    for (key, positions) in table.entries() {
        for slot in positions.iter() {
            let slot = slot as usize;
            if seen[slot] {
                return Err(Error::InvalidData(format!(
                    "slot {} appears twice in the {} index",
                    slot, what
                )));
            }
            seen[slot] = true;

            let actual = key_at(slot);
            if actual != key {
                return Err(Error::InvalidData(format!(
                    "{} index lists slot {} under {}, record belongs to {}",
                    what, slot, key, actual
                )));
            }
        }
    }
    Ok(())
}

impl Debug for PackedRatingStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedRatingStore")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("limit_index", &self.limit_index)
            .field("limit_timestamp", &self.limit_timestamp())
            .finish()
    }
}

impl RatingSource for PackedRatingStore {
    fn stream_ratings(&self, order: SortOrder) -> Box<dyn Iterator<Item = Rating> + Send + '_> {
        self.stream_events(order)
    }
}

impl UserRatingSource for PackedRatingStore {
    fn users(&self) -> Vec<u64> {
        self.user_ids().to_vec()
    }

    fn ratings_for_user(&self, user: u64) -> Option<Vec<Rating>> {
        self.events_for_user(user).map(|h| h.ratings.to_vec())
    }
}

impl ItemRatingSource for PackedRatingStore {
    fn items(&self) -> Vec<u64> {
        self.item_ids().to_vec()
    }

    fn ratings_for_item(&self, item: u64) -> Option<Vec<Rating>> {
        self.events_for_item(item).map(|e| e.ratings.to_vec())
    }

    fn users_for_item(&self, item: u64) -> Option<BTreeSet<u64>> {
        PackedRatingStore::users_for_item(self, item)
    }
}
