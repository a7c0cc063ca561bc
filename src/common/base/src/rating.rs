use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Rating is an immutable (user, item, value) event with an optional timestamp.
///
/// A NaN value marks an "unrate" event: the user withdrew a previous rating of the item.
#[derive(Clone, Copy, Debug)]
pub struct Rating {
    pub user: u64,
    pub item: u64,
    pub value: f64,
    pub timestamp: Option<u64>,
}

impl Rating {
    pub fn new(user: u64, item: u64, value: f64) -> Self {
        Self {
            user,
            item,
            value,
            timestamp: None,
        }
    }

    pub fn with_timestamp(user: u64, item: u64, value: f64, timestamp: u64) -> Self {
        Self {
            user,
            item,
            value,
            timestamp: Some(timestamp),
        }
    }

    pub fn unrate(user: u64, item: u64, timestamp: Option<u64>) -> Self {
        Self {
            user,
            item,
            value: f64::NAN,
            timestamp,
        }
    }

    /// has_value returns false for unrate events.
    pub fn has_value(&self) -> bool {
        !self.value.is_nan()
    }

    /// without_timestamp returns a copy of this rating with the timestamp cleared.
    pub fn without_timestamp(&self) -> Self {
        Self {
            timestamp: None,
            ..*self
        }
    }
}

// values compare by bit pattern so that records (including unrates) have a total equality
impl PartialEq for Rating {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user
            && self.item == other.item
            && self.value.to_bits() == other.value.to_bits()
            && self.timestamp == other.timestamp
    }
}

impl Eq for Rating {}

impl Hash for Rating {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.user.hash(state);
        self.item.hash(state);
        self.value.to_bits().hash(state);
        self.timestamp.hash(state);
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "user={} item={} value={}", self.user, self.item, self.value)?;
        if let Some(ts) = self.timestamp {
            write!(f, " ts={}", ts)?;
        }
        Ok(())
    }
}
