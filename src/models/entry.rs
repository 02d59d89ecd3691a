//! A single row in a folder listing or search result.

use serde::Serialize;

/// Whether an entry is a derived folder or a terminal object.
///
/// Folders are never stored as distinct entities: they exist only as
/// delimiter-grouped common prefixes or as zero-byte marker objects whose
/// key ends in `/`.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// One file or folder as shown to the user.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Entry {
    /// Display name: the last non-empty segment of the key.
    pub name: String,

    /// Fully-qualified object-store key (slash-terminated for folders).
    pub key: String,

    pub kind: EntryKind,

    /// Human-readable size; `-` for folders.
    pub size: String,

    /// Raw byte count; absent for folders.
    pub size_bytes: Option<u64>,

    /// `YYYY-MM-DD HH:MM:SS`; absent for folders.
    pub modified: Option<String>,
}

/// The two partitions of a delimiter listing.
#[derive(Serialize, Default, Debug)]
pub struct Listing {
    pub folders: Vec<Entry>,
    pub files: Vec<Entry>,
}
