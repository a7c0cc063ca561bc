use crate::format::FormatFlags;

pub mod packer;

/// PackOptions configures a rating packer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackOptions {
    /// flags selects the record format; TIMESTAMPS stores timestamps and orders records by them.
    pub flags: FormatFlags,
}

impl PackOptions {
    pub fn with_timestamps() -> Self {
        Self {
            flags: FormatFlags::TIMESTAMPS,
        }
    }
}
