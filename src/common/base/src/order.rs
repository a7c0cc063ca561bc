use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// SortOrder selects how a rating stream is ordered.
///
/// A packed rating file supports exactly these access patterns: its physical record
/// order (which is timestamp order when the file carries timestamps) and the two
/// key-grouped orders backed by its index tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Any order the source finds convenient.
    #[default]
    Any,
    /// Ascending timestamp.
    Timestamp,
    /// Grouped by user, users ascending.
    User,
    /// Grouped by item, items ascending.
    Item,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Any => "any",
            Self::Timestamp => "timestamp",
            Self::User => "user",
            Self::Item => "item",
        };
        f.write_str(s)
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "timestamp" => Ok(Self::Timestamp),
            "user" => Ok(Self::User),
            "item" => Ok(Self::Item),
            _ => Err(format!("unsupported sort order: {}", s)),
        }
    }
}
