//! Per-object metadata and folder usage snapshots.

use serde::Serialize;
use std::collections::HashMap;

/// Fresh snapshot of one object's metadata, one head request per call.
///
/// Nothing is cached: the values reflect the store's state at call time and
/// cost one round trip each time they are requested.
#[derive(Serialize, Clone, Debug)]
pub struct FileMetadata {
    pub size: u64,
    pub formatted_size: String,

    /// Content type as reported by the store, when it has one.
    pub content_type: Option<String>,

    /// Resolved mime type: the store's content type when present, otherwise
    /// a guess from the filename extension.
    pub mime_type: Option<String>,

    /// `YYYY-MM-DD HH:MM:SS`.
    pub last_modified: String,

    pub etag: Option<String>,
    pub storage_class: String,

    /// User-defined key/value tags (`x-amz-meta-*` style).
    pub user_metadata: HashMap<String, String>,
}

/// Aggregate size of everything under a folder prefix.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FolderUsage {
    pub total_bytes: u64,
    pub file_count: u64,
    pub formatted_size: String,
}
