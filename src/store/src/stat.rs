use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ratingpack_utils::time::{system_time_to_millis, time_format, unix_millis_to_time};

use crate::format::header::Header;

/// StoreDescription identifies the data behind a rating store for logs and tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreDescription {
    file: Option<PathBuf>,
    last_modified: i64,
    header: Header,
}

impl StoreDescription {
    pub fn new(file: Option<PathBuf>, modified: Option<SystemTime>, header: Header) -> Self {
        Self {
            file,
            last_modified: modified.map(system_time_to_millis).unwrap_or(0),
            header,
        }
    }

    /// file returns the backing file, or `None` for stores built from a buffer or a stream.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// last_modified returns the file's modification time in Unix milliseconds, 0 if unknown.
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl Display for StoreDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let file = self
            .file
            .as_deref()
            .unwrap_or_else(|| Path::new("/dev/null"));
        write!(
            f,
            "file={} mtime={} header={}",
            file.display(),
            time_format(unix_millis_to_time(self.last_modified)),
            self.header
        )
    }
}
