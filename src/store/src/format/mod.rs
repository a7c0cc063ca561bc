//!
//! A packed rating file is composed of four sections: header, records, user index and item index.
//!
//! ┌────────┬──────────────────────────┬──────────────┬──────────────┐
//! │ Header │         Records          │  User Index  │  Item Index  │
//! │24 bytes│ count * record size bytes│   N bytes    │   N bytes    │
//! └────────┴──────────────────────────┴──────────────┴──────────────┘
//!
//! The header identifies the file and declares how many records, users and items it holds.
//! The record size is not stored; it follows from the flags.
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Header                            │
//! ├─────────┬─────────┬─────────┬─────────┬─────────┬───────────┤
//! │  Magic  │ Version │  Flags  │ Records │  Users  │   Items   │
//! │ 4 bytes │ 4 bytes │ 4 bytes │ 4 bytes │ 4 bytes │  4 bytes  │
//! └─────────┴─────────┴─────────┴─────────┴─────────┴───────────┘
//!
//! Records are fixed width so that a slot number addresses a record directly.  When the
//! TIMESTAMPS flag is set the records are stored in non-decreasing timestamp order, ties
//! keeping their write order; otherwise they are stored in write order.
//!
//! ┌─────────────────────────────────────────────┐
//! │                   Record                    │
//! ├─────────┬─────────┬─────────┬───────────────┤
//! │  User   │  Item   │  Value  │  Timestamp    │
//! │ 8 bytes │ 8 bytes │ 8 bytes │8 bytes or none│
//! └─────────┴─────────┴─────────┴───────────────┘
//!
//! Each index table maps a key (user or item id) to the ascending slots of the records that
//! belong to it.  Entries are sorted ascending by key, with no duplicates.
//!
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Index Table                       │
//! ├─────────┬─────────┬─────────┬──────────┬──────────┬─────┤
//! │  Count  │   Key   │ Run Len │ Position │ Position │ ... │
//! │ 4 bytes │ 8 bytes │ 4 bytes │ 4 bytes  │ 4 bytes  │     │
//! └─────────┴─────────┴─────────┴──────────┴──────────┴─────┘
//!
//! All numbers are big-endian; values are IEEE-754 doubles.
//!

use bitflags::bitflags;

pub mod header;
pub mod record;

/// MAGIC_NUMBER is written as the first 4 bytes of a packed rating file.
pub const MAGIC_NUMBER: u32 = 0x5250_4B31; // "RPK1"

/// VERSION indicates the version of the file format.
pub const VERSION: u32 = 1;

/// Size in bytes of the file header.
pub const HEADER_SIZE: usize = 24;

/// Size in bytes of a record without a timestamp.
pub const BASE_RECORD_SIZE: usize = 24;

/// Size in bytes of a record with a timestamp.
pub const TIMESTAMPED_RECORD_SIZE: usize = 32;

/// Size in bytes of an index table's entry count.
pub const INDEX_COUNT_SIZE: usize = 4;

/// Size in bytes of an index entry's key and run length, excluding its positions.
pub const INDEX_ENTRY_HEADER_SIZE: usize = 8 + 4;

/// Size in bytes of one position in an index run.
pub const INDEX_POSITION_SIZE: usize = 4;

bitflags! {
    /// FormatFlags are the optional features of a packed rating file.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FormatFlags: u32 {
        /// Records carry a timestamp and are stored in timestamp order.
        const TIMESTAMPS = 0b0000_0001;
    }
}

impl FormatFlags {
    pub fn has_timestamps(&self) -> bool {
        self.contains(Self::TIMESTAMPS)
    }

    /// name renders the flag set for diagnostics.
    pub fn name(&self) -> &'static str {
        if self.has_timestamps() {
            "TIMESTAMPS"
        } else {
            "NONE"
        }
    }
}
