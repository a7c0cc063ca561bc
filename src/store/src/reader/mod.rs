pub mod list;
pub mod store;
pub mod stream;

/// ReadOptions configures how a packed rating file is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// verify checks every record at open: timestamps must be non-decreasing and each index
    /// table must cover every slot exactly once under the right key.  This costs a full pass
    /// over the records.
    pub verify: bool,
}

impl ReadOptions {
    pub fn verified() -> Self {
        Self { verify: true }
    }
}
