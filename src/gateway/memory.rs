//! In-memory gateway backed by a sorted key map.
//!
//! This is the reference implementation of the listing semantics (token
//! pagination, delimiter grouping, trailing-slash marker keys preserved
//! verbatim) and the backend the test suite runs against. Data does not
//! survive a restart.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use super::{
    GatewayError, GatewayResult, ListPage, ObjectInfo, ObjectRecord, ObjectStoreGateway,
};
use async_trait::async_trait;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
    etag: String,
    user_metadata: HashMap<String, String>,
}

/// In-memory object store with S3-flavored listing rules.
pub struct InMemoryGateway {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    page_size: usize,
    /// Remaining successful deletes before an injected fault, when set.
    delete_budget: Mutex<Option<usize>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Smaller pages make pagination observable in tests.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            delete_budget: Mutex::new(None),
        }
    }

    /// Let the next `n` deletes succeed, then fail every delete after them.
    /// Used by tests to observe partial folder deletion.
    pub fn fail_deletes_after(&self, n: usize) {
        *lock(&self.delete_budget) = Some(n);
    }

    fn store(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        lock(&self.objects)
    }

    fn take_delete_permit(&self) -> GatewayResult<()> {
        let mut budget = lock(&self.delete_budget);
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(GatewayError::Transfer("injected delete fault".into()));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fold `key` into its delimiter-grouped prefix, if it has one beyond
/// `prefix`. Mirrors S3's CommonPrefixes computation.
fn common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let after = key.strip_prefix(prefix)?;
    let pos = after.find(delimiter)?;
    Some(format!("{prefix}{}", &after[..pos + delimiter.len()]))
}

#[async_trait]
impl ObjectStoreGateway for InMemoryGateway {
    async fn probe(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<String>,
    ) -> GatewayResult<ListPage> {
        let store = self.store();

        let mut records: Vec<ObjectRecord> = Vec::new();
        let iter: Box<dyn Iterator<Item = (&String, &StoredObject)>> = match &token {
            Some(after) => Box::new(store.range::<String, _>((
                std::ops::Bound::Excluded(after.clone()),
                std::ops::Bound::Unbounded,
            ))),
            None => Box::new(store.iter()),
        };
        for (key, obj) in iter {
            if !key.starts_with(prefix) {
                if key.as_str() < prefix {
                    continue;
                }
                // Keys are sorted, nothing beyond this point can match.
                break;
            }
            records.push(ObjectRecord {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: obj.last_modified,
            });
            if records.len() > self.page_size {
                break;
            }
        }

        let mut next_token = None;
        if records.len() > self.page_size {
            records.truncate(self.page_size);
            next_token = records.last().map(|rec| rec.key.clone());
        }

        let mut grouped = BTreeSet::new();
        let mut objects = Vec::new();
        for rec in records {
            if let Some(delim) = delimiter {
                if let Some(folded) = common_prefix(&rec.key, prefix, delim) {
                    grouped.insert(folded);
                    continue;
                }
            }
            objects.push(rec);
        }

        Ok(ListPage {
            common_prefixes: grouped.into_iter().collect(),
            objects,
            next_token,
        })
    }

    async fn get(&self, key: &str) -> GatewayResult<Bytes> {
        self.store()
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<String>) -> GatewayResult<()> {
        let etag = format!("{:x}", md5::compute(&data));
        self.store().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type,
                last_modified: Utc::now(),
                etag,
                user_metadata: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        self.take_delete_permit()?;
        // Absent keys are fine, matching S3 DELETE semantics.
        self.store().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> GatewayResult<()> {
        for key in keys {
            self.take_delete_permit()?;
            self.store().remove(key);
        }
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> GatewayResult<()> {
        let mut store = self.store();
        let mut copied = store
            .get(src)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(src.to_string()))?;
        copied.last_modified = Utc::now();
        store.insert(dst.to_string(), copied);
        Ok(())
    }

    async fn head(&self, key: &str) -> GatewayResult<ObjectInfo> {
        self.store()
            .get(key)
            .map(|obj| ObjectInfo {
                size: obj.data.len() as u64,
                content_type: obj.content_type.clone(),
                last_modified: obj.last_modified,
                etag: Some(obj.etag.clone()),
                storage_class: "STANDARD".to_string(),
                user_metadata: obj.user_metadata.clone(),
            })
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    async fn presign(&self, _key: &str, _ttl: Duration) -> GatewayResult<String> {
        Err(GatewayError::Unsupported(
            "the in-memory gateway cannot sign URLs",
        ))
    }
}
