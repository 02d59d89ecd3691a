//! Gateway to the remote object-storage capability.
//!
//! Everything the file manager needs from a bucket goes through
//! [`ObjectStoreGateway`]: prefix/delimiter listings, single-object
//! get/put/copy/delete, bulk delete, metadata heads, and presigned URLs.
//! Keys are plain strings; the caller is responsible for rooting them under
//! the configured prefix. Folder markers are zero-byte objects whose key
//! ends in `/`.

pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

pub use memory::InMemoryGateway;
pub use s3::{S3Gateway, S3GatewayConfig};

/// One page of a prefix listing.
///
/// `common_prefixes` are the delimiter-grouped "folders" (slash-terminated);
/// `objects` are the terminal keys on this page. `next_token`, when present,
/// resumes the listing after the last key returned.
#[derive(Debug, Default)]
pub struct ListPage {
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectRecord>,
    pub next_token: Option<String>,
}

/// A single listed object.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Metadata snapshot returned by a head request.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub size: u64,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
    pub storage_class: String,
    pub user_metadata: HashMap<String, String>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bucket unreachable: {0}")]
    Connection(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("gateway not configured: {0}")]
    Unconfigured(String),
    #[error("{0}")]
    Unsupported(&'static str),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Synchronous-per-call facade over the remote store. One method, one remote
/// round trip (listings may be paginated by the backend). No retries here;
/// callers decide what a fault means.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Cheap connectivity check, the head-bucket analog. A failure means the
    /// bucket is unreachable or misconfigured and the service must not start.
    async fn probe(&self) -> GatewayResult<()>;

    /// Fetch one page of keys under `prefix`. With a delimiter, keys with a
    /// further delimiter occurrence are folded into `common_prefixes`.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<String>,
    ) -> GatewayResult<ListPage>;

    /// Read a full object body into memory.
    async fn get(&self, key: &str) -> GatewayResult<Bytes>;

    /// Write an object, overwriting any existing one at `key`.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<String>) -> GatewayResult<()>;

    /// Delete one key. Deleting an absent key succeeds (S3 semantics).
    async fn delete(&self, key: &str) -> GatewayResult<()>;

    /// Delete a batch of keys. Not atomic: keys are removed independently
    /// and a fault part-way leaves earlier deletions committed.
    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()>;

    /// Server-side copy of `src` to `dst`.
    async fn copy(&self, src: &str, dst: &str) -> GatewayResult<()>;

    /// Metadata-only request for a single key.
    async fn head(&self, key: &str) -> GatewayResult<ObjectInfo>;

    /// Create a time-limited public URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> GatewayResult<String>;
}
