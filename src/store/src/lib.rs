#[macro_use]
extern crate tracing;

pub mod bridge;
pub mod error;
pub mod format;
pub mod index;
pub mod reader;
pub mod stat;
pub mod writer;

pub use common_base::order::SortOrder;
pub use common_base::rating::Rating;

pub use crate::error::{Error, Result};
pub use crate::format::header::Header;
pub use crate::format::FormatFlags;
pub use crate::reader::list::{ItemEvents, RatingList, UserHistory};
pub use crate::reader::store::PackedRatingStore;
pub use crate::reader::ReadOptions;
pub use crate::stat::StoreDescription;
pub use crate::writer::packer::{pack_to_bytes, RatingPacker};
pub use crate::writer::PackOptions;
