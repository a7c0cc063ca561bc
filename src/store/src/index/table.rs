use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use ratingpack_utils::search::{binary_search, lower_bound};

use crate::error::{Error, Result};
use crate::format::{INDEX_COUNT_SIZE, INDEX_ENTRY_HEADER_SIZE, INDEX_POSITION_SIZE};
use crate::index::writer::IndexTableWriter;

/// Positions is a run of record slots, ascending, read directly from an index table.
#[derive(Clone, PartialEq, Eq)]
pub struct Positions {
    data: Bytes,
}

impl Positions {
    pub fn len(&self) -> usize {
        self.data.len() / INDEX_POSITION_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// get returns the i-th slot.  Panics if `i` is out of bounds.
    pub fn get(&self, i: usize) -> u32 {
        let mut b = &self.data[i * INDEX_POSITION_SIZE..(i + 1) * INDEX_POSITION_SIZE];
        b.get_u32()
    }

    pub fn first(&self) -> Option<u32> {
        (!self.is_empty()).then(|| self.get(0))
    }

    pub fn last(&self) -> Option<u32> {
        (!self.is_empty()).then(|| self.get(self.len() - 1))
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.data
            .chunks_exact(INDEX_POSITION_SIZE)
            .map(|mut b| b.get_u32())
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }
}

impl Debug for Positions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Run locates one key's positions within the table bytes.
#[derive(Clone, Copy, Debug)]
struct Run {
    offset: usize,
    len: u32,
}

/// IndexTable maps user or item ids to the slots of their records.
///
/// Keys are held in a sorted array for binary search; position runs stay in the shared
/// table bytes and are only decoded on access.  Cloning is cheap and clones share storage.
#[derive(Clone)]
pub struct IndexTable {
    keys: Arc<[u64]>,
    runs: Arc<[Run]>,
    data: Bytes,
}

impl IndexTable {
    pub fn empty() -> Self {
        Self {
            keys: Arc::from(Vec::new()),
            runs: Arc::from(Vec::new()),
            data: Bytes::new(),
        }
    }

    /// from_buffer parses a table of exactly `n` entries from the front of `buf` and advances
    /// `buf` past it.
    ///
    /// The structure is validated: the stored entry count must be `n`, keys must be strictly
    /// ascending and every run must be non-empty and strictly ascending.
    pub fn from_buffer(n: u32, buf: &mut Bytes) -> Result<Self> {
        let table = buf.clone();
        let available = buf.len() as u64;

        if buf.remaining() < INDEX_COUNT_SIZE {
            return Err(Error::truncated(INDEX_COUNT_SIZE as u64, available));
        }
        let count = buf.get_u32();
        if count != n {
            return Err(Error::InvalidData(format!(
                "index table holds {} entries, {} expected",
                count, n
            )));
        }

        let mut keys = Vec::with_capacity(n as usize);
        let mut runs = Vec::with_capacity(n as usize);
        let mut offset = INDEX_COUNT_SIZE;

        for _ in 0..n {
            if buf.remaining() < INDEX_ENTRY_HEADER_SIZE {
                return Err(Error::truncated(
                    (offset + INDEX_ENTRY_HEADER_SIZE) as u64,
                    available,
                ));
            }

            let key = buf.get_u64();
            let len = buf.get_u32();

            if let Some(&last) = keys.last() {
                if key <= last {
                    return Err(Error::InvalidData(format!(
                        "index keys out of order: {} after {}",
                        key, last
                    )));
                }
            }
            if len == 0 {
                return Err(Error::InvalidData(format!("key {} has an empty run", key)));
            }

            let size = len as usize * INDEX_POSITION_SIZE;
            offset += INDEX_ENTRY_HEADER_SIZE;
            if buf.remaining() < size {
                return Err(Error::truncated((offset + size) as u64, available));
            }

            let positions = Positions {
                data: buf.slice(..size),
            };
            check_ascending(key, &positions)?;

            keys.push(key);
            runs.push(Run { offset, len });

            buf.advance(size);
            offset += size;
        }

        Ok(Self {
            keys: Arc::from(keys),
            runs: Arc::from(runs),
            data: table.slice(..offset),
        })
    }

    /// read_from reads a self-delimiting table (entry count first) from a stream.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let eof = |e| Error::eof_as_invalid(e, "index table");

        let count = r.read_u32::<BigEndian>().map_err(eof)?;
        let mut buf = BytesMut::new();
        buf.put_u32(count);

        for _ in 0..count {
            let key = r.read_u64::<BigEndian>().map_err(eof)?;
            let len = r.read_u32::<BigEndian>().map_err(eof)?;
            buf.put_u64(key);
            buf.put_u32(len);

            let size = len as u64 * INDEX_POSITION_SIZE as u64;
            let mut run = Vec::new();
            r.by_ref().take(size).read_to_end(&mut run)?;
            if run.len() as u64 != size {
                return Err(Error::InvalidData(format!(
                    "unexpected end of stream reading positions of key {}",
                    key
                )));
            }
            buf.extend_from_slice(&run);
        }

        Self::from_buffer(count, &mut buf.freeze())
    }

    /// encode renders the table in its binary form.
    pub fn encode(&self) -> Result<Bytes> {
        let mut w = IndexTableWriter::new(self.keys.len() as u32);
        for (key, positions) in self.entries() {
            w.write_entry(key, &positions.to_vec())?;
        }
        w.finish()
    }

    /// len returns the number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// keys returns the distinct keys in ascending order.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    /// contains returns true if `key` owns at least one slot.
    pub fn contains(&self, key: u64) -> bool {
        self.find(key).is_some()
    }

    /// entry returns the slots of `key` in record order, or `None` if the key is unknown.
    pub fn entry(&self, key: u64) -> Option<Positions> {
        self.find(key).map(|idx| self.positions_at(idx))
    }

    /// entries iterates (key, slots) pairs in ascending key order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, Positions)> + '_ {
        (0..self.keys.len()).map(|i| (self.keys[i], self.positions_at(i)))
    }

    /// position_count returns the total number of slots across all keys.
    pub fn position_count(&self) -> u64 {
        self.runs.iter().map(|r| r.len as u64).sum()
    }

    /// check_positions verifies every slot lies below `limit`.
    pub fn check_positions(&self, limit: u32) -> Result<()> {
        for (key, positions) in self.entries() {
            if let Some(last) = positions.last() {
                if last >= limit {
                    return Err(Error::InvalidData(format!(
                        "key {} refers to slot {} beyond {} records",
                        key, last, limit
                    )));
                }
            }
        }
        Ok(())
    }

    /// create_limited_view returns a table restricted to slots below `max_slot`.
    ///
    /// Keys left without slots are dropped.  The view shares the table bytes; only the key
    /// array and run bookkeeping are rebuilt.
    pub fn create_limited_view(&self, max_slot: u32) -> Self {
        let mut keys = Vec::new();
        let mut runs = Vec::new();

        for (i, run) in self.runs.iter().enumerate() {
            let positions = self.positions_at(i);
            let n = lower_bound(positions.len(), |j| max_slot.cmp(&positions.get(j)));
            if n > 0 {
                keys.push(self.keys[i]);
                runs.push(Run {
                    offset: run.offset,
                    len: n as u32,
                });
            }
        }

        Self {
            keys: Arc::from(keys),
            runs: Arc::from(runs),
            data: self.data.clone(),
        }
    }

    fn find(&self, key: u64) -> Option<usize> {
        binary_search(self.keys.len(), |i| key.cmp(&self.keys[i])).ok()
    }

    fn positions_at(&self, idx: usize) -> Positions {
        let run = self.runs[idx];
        let end = run.offset + run.len as usize * INDEX_POSITION_SIZE;
        Positions {
            data: self.data.slice(run.offset..end),
        }
    }

    fn into_entries(self) -> IntoEntries {
        IntoEntries { table: self, i: 0 }
    }
}

impl IntoIterator for IndexTable {
    type Item = (u64, Positions);
    type IntoIter = IntoEntries;

    fn into_iter(self) -> Self::IntoIter {
        self.into_entries()
    }
}

/// IntoEntries is an owning iterator over the entries of an index table.
pub struct IntoEntries {
    table: IndexTable,
    i: usize,
}

impl Iterator for IntoEntries {
    type Item = (u64, Positions);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i >= self.table.len() {
            return None;
        }

        let item = (self.table.keys[self.i], self.table.positions_at(self.i));
        self.i += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.table.len() - self.i;
        (n, Some(n))
    }
}

impl Debug for IndexTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

fn check_ascending(key: u64, positions: &Positions) -> Result<()> {
    let mut prev: Option<u32> = None;
    for p in positions.iter() {
        if let Some(prev) = prev {
            if p <= prev {
                return Err(Error::InvalidData(format!(
                    "positions of key {} out of order: {} after {}",
                    key, p, prev
                )));
            }
        }
        prev = Some(p);
    }
    Ok(())
}
