//! The virtual filesystem: folder-tree semantics projected onto a flat,
//! prefix-scoped object namespace.
//!
//! Folders are derived, never stored: a folder exists as a delimiter-grouped
//! common prefix or as a zero-byte marker object at a `*/` key. All state
//! lives in the remote bucket; every operation here is one or more gateway
//! round trips with no caching and no retries. Multi-step operations (folder
//! delete, folder rename) are sequences of independent calls — a fault
//! part-way leaves the folder in a mixed state with no rollback, and callers
//! only learn about the step that failed.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, ObjectRecord, ObjectStoreGateway};
use crate::models::entry::{Entry, EntryKind, Listing};
use crate::models::metadata::{FileMetadata, FolderUsage};
use crate::models::preview::Preview;
use crate::services::path::PathFormatter;
use crate::services::preview;

/// Bulk deletes are issued in chunks of this many keys.
const DELETE_BATCH_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum FsError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("unable to decode `{key}`: {reason}")]
    Decode { key: String, reason: String },
    #[error("key `{key}` does not begin with prefix `{prefix}`")]
    KeyOutsidePrefix { key: String, prefix: String },
}

pub type FsResult<T> = Result<T, FsError>;

/// File-manager operations over one bucket, scoped under a root prefix.
///
/// Cheap to clone; the gateway is shared. Construction probes the bucket, so
/// a `VirtualFilesystem` that exists is one whose bucket answered at least
/// once.
#[derive(Clone)]
pub struct VirtualFilesystem {
    gateway: Arc<dyn ObjectStoreGateway>,
    paths: PathFormatter,
}

impl VirtualFilesystem {
    /// Check connectivity and build the filesystem. A probe failure means
    /// the whole service reports itself not connected and refuses to start.
    pub async fn connect(
        gateway: Arc<dyn ObjectStoreGateway>,
        root_prefix: &str,
    ) -> FsResult<Self> {
        gateway.probe().await?;
        Ok(Self {
            gateway,
            paths: PathFormatter::new(root_prefix),
        })
    }

    /// Re-run the connectivity check, for readiness probes.
    pub async fn probe(&self) -> FsResult<()> {
        self.gateway.probe().await?;
        Ok(())
    }

    /// List the immediate children of a folder, partitioned into folders
    /// (delimiter-grouped prefixes) and files.
    ///
    /// The folder's own marker object and nested markers (keys whose final
    /// segment is empty) are suppressed from the file list.
    pub async fn list(&self, path: &str) -> FsResult<Listing> {
        let prefix = self.paths.format(path);

        let mut folder_prefixes = BTreeSet::new();
        let mut files = Vec::new();
        let mut token = None;
        loop {
            let page = self.gateway.list_page(&prefix, Some("/"), token).await?;
            folder_prefixes.extend(page.common_prefixes);
            for obj in page.objects {
                if obj.key == prefix {
                    continue;
                }
                let name = obj.key.rsplit('/').next().unwrap_or_default().to_string();
                if name.is_empty() {
                    continue;
                }
                files.push(Entry {
                    name,
                    kind: EntryKind::File,
                    size: format_size(obj.size),
                    size_bytes: Some(obj.size),
                    modified: Some(format_timestamp(&obj.last_modified)),
                    key: obj.key,
                });
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let folders = folder_prefixes
            .into_iter()
            .map(|prefix| Entry {
                name: last_segment(&prefix).to_string(),
                key: prefix,
                kind: EntryKind::Folder,
                size: "-".to_string(),
                size_bytes: None,
                modified: None,
            })
            .collect();

        Ok(Listing { folders, files })
    }

    /// Write `content` at `folder/name`. No post-write verification.
    pub async fn upload(
        &self,
        path: &str,
        name: &str,
        content: Bytes,
        content_type: Option<String>,
    ) -> FsResult<String> {
        let key = format!("{}{name}", self.paths.format(path));
        debug!("upload `{}` ({} bytes)", key, content.len());
        self.gateway.put(&key, content, content_type).await?;
        Ok(key)
    }

    /// Read a full object body into memory. No size guard: large objects
    /// are fully buffered.
    pub async fn download(&self, key: &str) -> FsResult<Bytes> {
        Ok(self.gateway.get(key).await?)
    }

    /// Create an empty folder by writing a zero-byte marker object at
    /// `parent/name/`.
    pub async fn create_folder(&self, name: &str, parent: &str) -> FsResult<String> {
        let key = format!("{}{name}/", self.paths.format(parent));
        debug!("create folder marker `{}`", key);
        self.gateway.put(&key, Bytes::new(), None).await?;
        Ok(key)
    }

    /// Delete a file, or — for a slash-terminated key — every object under
    /// that prefix. Returns how many keys were removed.
    ///
    /// Folder deletion is not atomic: keys are removed in listing order and
    /// a fault part-way leaves the remainder in place.
    pub async fn delete(&self, key: &str) -> FsResult<usize> {
        if key.ends_with('/') {
            let keys: Vec<String> = self
                .collect_keys(key)
                .await?
                .into_iter()
                .map(|record| record.key)
                .collect();
            for batch in keys.chunks(DELETE_BATCH_SIZE) {
                self.gateway.delete_many(batch).await?;
            }
            debug!("deleted {} keys under `{}`", keys.len(), key);
            Ok(keys.len())
        } else {
            self.gateway.delete(key).await?;
            Ok(1)
        }
    }

    /// Rename a file or folder in place, returning the new key.
    ///
    /// Implemented as copy-then-delete per object, so neither the operation
    /// as a whole nor any single step is atomic: a fault between copy and
    /// delete leaves the object at both locations, and a fault mid-folder
    /// leaves some children renamed and others not.
    pub async fn rename(&self, old_key: &str, new_name: &str) -> FsResult<String> {
        let is_folder = old_key.ends_with('/');
        let trimmed = old_key.trim_end_matches('/');
        let mut new_key = match trimmed.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/{new_name}"),
            None => new_name.to_string(),
        };

        if is_folder {
            new_key.push('/');
            for child in self.collect_keys(old_key).await? {
                let suffix =
                    child
                        .key
                        .strip_prefix(old_key)
                        .ok_or_else(|| FsError::KeyOutsidePrefix {
                            key: child.key.clone(),
                            prefix: old_key.to_string(),
                        })?;
                let dest = format!("{new_key}{suffix}");
                self.gateway.copy(&child.key, &dest).await?;
                self.gateway.delete(&child.key).await?;
            }
        } else {
            self.gateway.copy(old_key, &new_key).await?;
            self.gateway.delete(old_key).await?;
        }

        debug!("renamed `{}` -> `{}`", old_key, new_key);
        Ok(new_key)
    }

    /// Case-insensitive substring search of `term` against the final
    /// segment of every key under the resolved prefix, at unbounded depth.
    /// Returns all matches; display truncation belongs to the caller.
    pub async fn search(&self, term: &str, path: &str) -> FsResult<Vec<Entry>> {
        let prefix = self.paths.format(path);
        let needle = term.to_lowercase();

        let mut results = Vec::new();
        for record in self.collect_keys(&prefix).await? {
            let name = record.key.rsplit('/').next().unwrap_or_default().to_string();
            if !name.to_lowercase().contains(&needle) {
                continue;
            }
            let kind = if record.key.ends_with('/') {
                EntryKind::Folder
            } else {
                EntryKind::File
            };
            results.push(Entry {
                name,
                kind,
                size: format_size(record.size),
                size_bytes: Some(record.size),
                modified: Some(format_timestamp(&record.last_modified)),
                key: record.key,
            });
        }
        Ok(results)
    }

    /// Sum sizes and counts of every object under a folder. O(n) in object
    /// count, recomputed on every call. Marker objects count as zero-byte
    /// files, as the store reports them.
    pub async fn folder_size(&self, path: &str) -> FsResult<FolderUsage> {
        let prefix = self.paths.format(path);
        let mut total_bytes = 0u64;
        let mut file_count = 0u64;
        for record in self.collect_keys(&prefix).await? {
            total_bytes += record.size;
            file_count += 1;
        }
        Ok(FolderUsage {
            total_bytes,
            file_count,
            formatted_size: format_size(total_bytes),
        })
    }

    /// One head request. The mime type prefers the store's content type and
    /// falls back to a filename-extension guess.
    pub async fn metadata(&self, key: &str) -> FsResult<FileMetadata> {
        let info = self.gateway.head(key).await?;
        let mime_type = info
            .content_type
            .clone()
            .or_else(|| mime_guess::from_path(key).first_raw().map(str::to_string));

        Ok(FileMetadata {
            size: info.size,
            formatted_size: format_size(info.size),
            content_type: info.content_type,
            mime_type,
            last_modified: format_timestamp(&info.last_modified),
            etag: info.etag,
            storage_class: info.storage_class,
            user_metadata: info.user_metadata,
        })
    }

    /// Time-limited share link, or `None` on any fault.
    pub async fn presign(&self, key: &str, ttl: Duration) -> Option<String> {
        match self.gateway.presign(key, ttl).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!("presign failed for `{}`: {}", key, err);
                None
            }
        }
    }

    /// Preview an object, never failing hard.
    ///
    /// The size is checked with a metadata-only request before the body is
    /// fetched; oversized objects come back as the error variant without a
    /// body transfer.
    pub async fn preview(&self, key: &str, max_bytes: u64) -> Preview {
        let info = match self.gateway.head(key).await {
            Ok(info) => info,
            Err(err) => {
                return Preview::Error {
                    message: format!("preview failed: {err}"),
                };
            }
        };

        if info.size > max_bytes {
            return Preview::Error {
                message: format!(
                    "file too large for preview (>{:.1} MB)",
                    max_bytes as f64 / (1024.0 * 1024.0)
                ),
            };
        }

        let content = match self.gateway.get(key).await {
            Ok(body) => body,
            Err(err) => {
                return Preview::Error {
                    message: format!("preview failed: {err}"),
                };
            }
        };

        preview::render(key, info.size, &content)
    }

    /// Drain every listing page under `prefix` into memory, sequentially.
    async fn collect_keys(&self, prefix: &str) -> FsResult<Vec<ObjectRecord>> {
        let mut records = Vec::new();
        let mut token = None;
        loop {
            let page = self.gateway.list_page(prefix, None, token).await?;
            records.extend(page.objects);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(records)
    }
}

/// Last non-empty `/`-separated segment of a key or prefix.
fn last_segment(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

/// Binary-unit size formatting with one decimal place. PB is the ceiling:
/// values past it keep growing in PB.
pub fn format_size(size_bytes: u64) -> String {
    let mut value = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} PB")
}

/// `YYYY-MM-DD HH:MM:SS` in the store's reported time zone.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;

    async fn fixture() -> (Arc<InMemoryGateway>, VirtualFilesystem) {
        let gateway = Arc::new(InMemoryGateway::new());
        let fs = VirtualFilesystem::connect(gateway.clone(), "app")
            .await
            .unwrap();
        (gateway, fs)
    }

    async fn seed(gateway: &InMemoryGateway, entries: &[(&str, &str)]) {
        for (key, content) in entries {
            gateway
                .put(key, Bytes::from(content.to_string()), None)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn list_partitions_folders_and_files() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/", ""),
                ("app/docs/a.txt", "a"),
                ("app/docs/sub/b.txt", "b"),
                ("app/photos/", ""),
                ("app/top.txt", "t"),
            ],
        )
        .await;

        let listing = fs.list("").await.unwrap();
        let folder_names: Vec<_> = listing.folders.iter().map(|e| e.name.as_str()).collect();
        let file_names: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(folder_names, vec!["docs", "photos"]);
        assert_eq!(file_names, vec!["top.txt"]);

        for folder in &listing.folders {
            assert_eq!(folder.kind, EntryKind::Folder);
            assert_eq!(folder.size, "-");
            assert!(folder.modified.is_none());
        }
        for file in &listing.files {
            assert_eq!(file.kind, EntryKind::File);
            assert!(file.modified.is_some());
        }
    }

    #[tokio::test]
    async fn list_suppresses_own_marker() {
        let (gateway, fs) = fixture().await;
        seed(&gateway, &[("app/docs/", ""), ("app/docs/a.txt", "a")]).await;

        let listing = fs.list("docs").await.unwrap();
        assert!(listing.folders.is_empty());
        let names: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn upload_download_round_trip() {
        let (_gateway, fs) = fixture().await;
        let payload = Bytes::from(vec![0xAB; 6 * 1024 * 1024]);

        let key = fs
            .upload("docs", "blob.bin", payload.clone(), None)
            .await
            .unwrap();
        assert_eq!(key, "app/docs/blob.bin");

        let fetched = fs.download(&key).await.unwrap();
        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn created_folder_appears_in_listing() {
        let (_gateway, fs) = fixture().await;
        let key = fs.create_folder("reports", "").await.unwrap();
        assert_eq!(key, "app/reports/");

        let listing = fs.list("").await.unwrap();
        let names: Vec<_> = listing.folders.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["reports"]);
    }

    #[tokio::test]
    async fn delete_file_removes_only_that_key() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/docs/a.txt", "a"),
                ("app/docs/b.txt", "b"),
                ("app/docs/c.txt", "c"),
            ],
        )
        .await;

        let removed = fs.delete("app/docs/b.txt").await.unwrap();
        assert_eq!(removed, 1);

        let listing = fs.list("docs").await.unwrap();
        let names: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn delete_folder_removes_every_key_under_prefix() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/docs/", ""),
                ("app/docs/a.txt", "a"),
                ("app/docs/sub/b.txt", "b"),
                ("app/other.txt", "o"),
            ],
        )
        .await;

        let removed = fs.delete("app/docs/").await.unwrap();
        assert_eq!(removed, 3);

        let listing = fs.list("").await.unwrap();
        assert!(listing.folders.is_empty());
        let names: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["other.txt"]);
    }

    #[tokio::test]
    async fn faulted_folder_delete_leaves_survivors() {
        let (gateway, fs) = fixture().await;
        let keys: Vec<String> = (0..5).map(|i| format!("app/docs/{i}.txt")).collect();
        for key in &keys {
            gateway
                .put(key, Bytes::from_static(b"x"), None)
                .await
                .unwrap();
        }

        gateway.fail_deletes_after(2);
        let err = fs.delete("app/docs/").await.unwrap_err();
        assert!(matches!(err, FsError::Gateway(GatewayError::Transfer(_))));

        // 2 of 5 deletions committed, no rollback.
        let page = gateway.list_page("app/docs/", None, None).await.unwrap();
        assert_eq!(page.objects.len(), 3);
    }

    #[tokio::test]
    async fn rename_folder_moves_every_child() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/old/", ""),
                ("app/old/a.txt", "alpha"),
                ("app/old/sub/b.txt", "beta"),
            ],
        )
        .await;

        let new_key = fs.rename("app/old/", "new").await.unwrap();
        assert_eq!(new_key, "app/new/");

        let remaining = gateway.list_page("app/old/", None, None).await.unwrap();
        assert!(remaining.objects.is_empty());

        assert_eq!(
            gateway.get("app/new/a.txt").await.unwrap(),
            Bytes::from_static(b"alpha")
        );
        assert_eq!(
            gateway.get("app/new/sub/b.txt").await.unwrap(),
            Bytes::from_static(b"beta")
        );
        gateway.get("app/new/").await.unwrap();
    }

    #[tokio::test]
    async fn rename_file_is_copy_then_delete() {
        let (gateway, fs) = fixture().await;
        seed(&gateway, &[("app/docs/a.txt", "content")]).await;

        let new_key = fs.rename("app/docs/a.txt", "z.txt").await.unwrap();
        assert_eq!(new_key, "app/docs/z.txt");
        assert_eq!(
            gateway.get("app/docs/z.txt").await.unwrap(),
            Bytes::from_static(b"content")
        );
        assert!(matches!(
            gateway.get("app/docs/a.txt").await.unwrap_err(),
            GatewayError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn search_matches_final_segment_case_insensitively() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/a/report.csv", "r"),
                ("app/a/b/Report_final.pdf", "r"),
                ("app/a/other.txt", "o"),
            ],
        )
        .await;

        let results = fs.search("report", "").await.unwrap();
        let keys: Vec<_> = results.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["app/a/b/Report_final.pdf", "app/a/report.csv"]);
    }

    #[tokio::test]
    async fn folder_size_sums_all_objects() {
        let (gateway, fs) = fixture().await;
        seed(
            &gateway,
            &[
                ("app/docs/", ""),
                ("app/docs/a.txt", "abc"),
                ("app/docs/sub/b.txt", "hello"),
            ],
        )
        .await;

        let usage = fs.folder_size("docs").await.unwrap();
        assert_eq!(usage.total_bytes, 8);
        // Marker objects count as zero-byte files.
        assert_eq!(usage.file_count, 3);
        assert_eq!(usage.formatted_size, "8.0 B");
    }

    #[tokio::test]
    async fn metadata_prefers_store_content_type() {
        let (gateway, fs) = fixture().await;
        gateway
            .put(
                "app/data.csv",
                Bytes::from_static(b"a,b"),
                Some("application/custom".to_string()),
            )
            .await
            .unwrap();

        let meta = fs.metadata("app/data.csv").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("application/custom"));
        assert_eq!(meta.mime_type.as_deref(), Some("application/custom"));
        assert_eq!(meta.size, 3);
        assert_eq!(meta.formatted_size, "3.0 B");
        assert_eq!(meta.storage_class, "STANDARD");
        assert!(meta.etag.is_some());
    }

    #[tokio::test]
    async fn metadata_falls_back_to_extension_guess() {
        let (gateway, fs) = fixture().await;
        seed(&gateway, &[("app/data.csv", "a,b")]).await;

        let meta = fs.metadata("app/data.csv").await.unwrap();
        assert!(meta.content_type.is_none());
        assert_eq!(meta.mime_type.as_deref(), Some("text/csv"));
    }

    #[tokio::test]
    async fn metadata_of_missing_key_is_not_found() {
        let (_gateway, fs) = fixture().await;
        let err = fs.metadata("app/missing.txt").await.unwrap_err();
        assert!(matches!(err, FsError::Gateway(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn presign_fault_yields_none() {
        let (gateway, fs) = fixture().await;
        seed(&gateway, &[("app/file.txt", "x")]).await;
        assert!(
            fs.presign("app/file.txt", Duration::from_secs(3600))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn preview_rejects_oversized_objects_before_fetch() {
        let (gateway, fs) = fixture().await;
        gateway
            .put(
                "app/big.txt",
                Bytes::from(vec![b'a'; 6 * 1024 * 1024]),
                None,
            )
            .await
            .unwrap();

        let preview = fs
            .preview("app/big.txt", preview::DEFAULT_MAX_PREVIEW_BYTES)
            .await;
        match preview {
            Preview::Error { message } => assert!(message.contains("too large")),
            other => panic!("expected error preview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn preview_truncates_long_text() {
        let (gateway, fs) = fixture().await;
        let body: String = "x".repeat(preview::TEXT_PREVIEW_CHARS + 500);
        gateway
            .put("app/big.log", Bytes::from(body), None)
            .await
            .unwrap();

        let preview = fs
            .preview("app/big.log", preview::DEFAULT_MAX_PREVIEW_BYTES)
            .await;
        match preview {
            Preview::Text { content, truncated } => {
                assert!(truncated);
                assert_eq!(content.chars().count(), preview::TEXT_PREVIEW_CHARS);
            }
            other => panic!("expected text preview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn preview_of_missing_key_is_error_variant() {
        let (_gateway, fs) = fixture().await;
        let preview = fs
            .preview("app/missing.txt", preview::DEFAULT_MAX_PREVIEW_BYTES)
            .await;
        assert!(matches!(preview, Preview::Error { .. }));
    }

    #[test]
    fn format_size_fixed_points() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(1023), "1023.0 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1048576), "1.0 MB");
        assert_eq!(format_size(1024u64.pow(4)), "1.0 TB");
        assert_eq!(format_size(1024u64.pow(5)), "1.0 PB");
        // PB is the ceiling; values past it keep growing in PB.
        assert_eq!(format_size(1024u64.pow(6)), "1024.0 PB");
    }

    #[test]
    fn timestamps_render_sortable() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T08:30:15Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2024-05-01 08:30:15");
    }
}
