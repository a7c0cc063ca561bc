use std::iter::FusedIterator;

use bytes::Bytes;

use crate::format::record::RecordFormat;
use crate::index::table::IntoEntries;
use crate::reader::list::{ItemEvents, RatingList, UserHistory};

/// Groups walks an index table in ascending key order, producing each key's ratings only
/// when it is reached.
struct Groups {
    format: RecordFormat,
    data: Bytes,
    entries: IntoEntries,
}

impl Groups {
    fn next_group(&mut self) -> Option<(u64, RatingList)> {
        let (key, positions) = self.entries.next()?;
        Some((key, RatingList::run(self.format, self.data.clone(), positions)))
    }
}

/// UserHistories streams the history of every user, users ascending.
pub struct UserHistories {
    groups: Groups,
}

impl UserHistories {
    pub(crate) fn new(format: RecordFormat, data: Bytes, entries: IntoEntries) -> Self {
        Self {
            groups: Groups {
                format,
                data,
                entries,
            },
        }
    }
}

impl Iterator for UserHistories {
    type Item = UserHistory;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups
            .next_group()
            .map(|(user, ratings)| UserHistory { user, ratings })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.entries.size_hint()
    }
}

impl ExactSizeIterator for UserHistories {}

impl FusedIterator for UserHistories {}

/// ItemEventStream streams the events of every item, items ascending.
pub struct ItemEventStream {
    groups: Groups,
}

impl ItemEventStream {
    pub(crate) fn new(format: RecordFormat, data: Bytes, entries: IntoEntries) -> Self {
        Self {
            groups: Groups {
                format,
                data,
                entries,
            },
        }
    }
}

impl Iterator for ItemEventStream {
    type Item = ItemEvents;

    fn next(&mut self) -> Option<Self::Item> {
        self.groups
            .next_group()
            .map(|(item, ratings)| ItemEvents { item, ratings })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.entries.size_hint()
    }
}

impl ExactSizeIterator for ItemEventStream {}

impl FusedIterator for ItemEventStream {}
