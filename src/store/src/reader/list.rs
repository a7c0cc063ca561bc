use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::iter::FusedIterator;
use std::ops::Range;

use bytes::Bytes;
use common_base::rating::Rating;

use crate::format::record::RecordFormat;
use crate::index::table::Positions;

#[derive(Clone)]
enum Slots {
    Range(Range<u32>),
    Run(Positions),
}

impl Slots {
    fn len(&self) -> usize {
        match self {
            Slots::Range(r) => r.len(),
            Slots::Run(p) => p.len(),
        }
    }

    fn get(&self, i: usize) -> u32 {
        match self {
            Slots::Range(r) => r.start + i as u32,
            Slots::Run(p) => p.get(i),
        }
    }
}

/// RatingList is a random-access list of ratings decoded on demand from a record region.
///
/// The list holds a shared view of the region and the slots it covers, so it stays valid
/// after the store it came from is dropped and is cheap to clone.
#[derive(Clone)]
pub struct RatingList {
    format: RecordFormat,
    data: Bytes,
    slots: Slots,
}

impl RatingList {
    pub(crate) fn range(format: RecordFormat, data: Bytes, slots: Range<u32>) -> Self {
        Self {
            format,
            data,
            slots: Slots::Range(slots),
        }
    }

    pub(crate) fn run(format: RecordFormat, data: Bytes, positions: Positions) -> Self {
        Self {
            format,
            data,
            slots: Slots::Run(positions),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    /// get decodes the i-th rating of the list.
    pub fn get(&self, i: usize) -> Option<Rating> {
        if i >= self.len() {
            return None;
        }
        Some(self.decode(i))
    }

    /// slot returns the record slot holding the i-th rating.
    pub fn slot(&self, i: usize) -> Option<u32> {
        (i < self.len()).then(|| self.slots.get(i))
    }

    pub fn first(&self) -> Option<Rating> {
        self.get(0)
    }

    pub fn last(&self) -> Option<Rating> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            front: 0,
            back: self.len(),
        }
    }

    pub fn to_vec(&self) -> Vec<Rating> {
        self.iter().collect()
    }

    fn decode(&self, i: usize) -> Rating {
        self.format.read_slot(&self.data, self.slots.get(i) as usize)
    }
}

impl Debug for RatingList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for RatingList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

pub struct Iter<'a> {
    list: &'a RatingList,
    front: usize,
    back: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Rating;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let r = self.list.decode(self.front);
        self.front += 1;
        Some(r)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.list.decode(self.back))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> FusedIterator for Iter<'a> {}

impl<'a> IntoIterator for &'a RatingList {
    type Item = Rating;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// IntoIter is an owning iterator over a rating list.
pub struct IntoIter {
    list: RatingList,
    i: usize,
}

impl Iterator for IntoIter {
    type Item = Rating;

    fn next(&mut self) -> Option<Self::Item> {
        if self.i >= self.list.len() {
            return None;
        }
        let r = self.list.decode(self.i);
        self.i += 1;
        Some(r)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.list.len() - self.i;
        (n, Some(n))
    }
}

impl ExactSizeIterator for IntoIter {}

impl FusedIterator for IntoIter {}

impl IntoIterator for RatingList {
    type Item = Rating;
    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { list: self, i: 0 }
    }
}

/// UserHistory is the ratings of one user, in record order.
#[derive(Clone, Debug, PartialEq)]
pub struct UserHistory {
    pub user: u64,
    pub ratings: RatingList,
}

impl UserHistory {
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.ratings.iter()
    }

    /// filter returns the ratings matching `pred`, in record order.
    pub fn filter<P>(&self, mut pred: P) -> Vec<Rating>
    where
        P: FnMut(&Rating) -> bool,
    {
        self.ratings.iter().filter(|r| pred(r)).collect()
    }

    /// items returns the distinct items the user rated.
    pub fn items(&self) -> BTreeSet<u64> {
        self.ratings.iter().map(|r| r.item).collect()
    }
}

/// ItemEvents is the ratings of one item, in record order.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemEvents {
    pub item: u64,
    pub ratings: RatingList,
}

impl ItemEvents {
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.ratings.iter()
    }

    /// users returns the distinct users who rated the item.
    pub fn users(&self) -> BTreeSet<u64> {
        self.ratings.iter().map(|r| r.user).collect()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use common_base::rating::Rating;

    use crate::format::record::RecordFormat;
    use crate::format::FormatFlags;
    use crate::index::table::IndexTable;
    use crate::index::writer::IndexTableWriter;
    use crate::reader::list::{RatingList, UserHistory};

    fn region(format: RecordFormat, ratings: &[Rating]) -> Bytes {
        let mut buf = BytesMut::new();
        for r in ratings {
            format.encode(r, &mut buf).unwrap();
        }
        buf.freeze()
    }

    #[test]
    fn test_range() {
        let format = RecordFormat::new(FormatFlags::empty());
        let ratings = [
            Rating::new(1, 10, 1.0),
            Rating::new(2, 10, 2.0),
            Rating::new(1, 11, 3.0),
        ];
        let data = region(format, &ratings);

        let list = RatingList::range(format, data.clone(), 1..3);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), Some(ratings[1]));
        assert_eq!(list.get(1), Some(ratings[2]));
        assert_eq!(list.get(2), None);
        assert_eq!(list.slot(1), Some(2));
        assert_eq!(list.last(), Some(ratings[2]));
        assert_eq!(list.iter().rev().collect::<Vec<_>>(), vec![ratings[2], ratings[1]]);
        assert_eq!(list.clone().into_iter().count(), 2);

        let empty = RatingList::range(format, data, 0..0);
        assert!(empty.is_empty());
        assert_eq!(empty.first(), None);
        assert_eq!(empty.last(), None);
    }

    #[test]
    fn test_run() {
        let format = RecordFormat::new(FormatFlags::TIMESTAMPS);
        let ratings = [
            Rating::with_timestamp(1, 10, 1.0, 5),
            Rating::with_timestamp(2, 10, 2.0, 6),
            Rating::with_timestamp(1, 11, 3.0, 7),
        ];
        let data = region(format, &ratings);

        let mut w = IndexTableWriter::new(2);
        w.write_entry(1, &[0, 2]).unwrap();
        w.write_entry(2, &[1]).unwrap();
        let table = IndexTable::from_buffer(2, &mut w.finish().unwrap()).unwrap();

        let history = UserHistory {
            user: 1,
            ratings: RatingList::run(format, data, table.entry(1).unwrap()),
        };
        assert_eq!(history.len(), 2);
        assert_eq!(history.ratings.to_vec(), vec![ratings[0], ratings[2]]);
        assert_eq!(history.filter(|r| r.value > 2.0), vec![ratings[2]]);
        assert_eq!(history.items().into_iter().collect::<Vec<_>>(), vec![10, 11]);
    }
}
