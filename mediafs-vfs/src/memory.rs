//! In-memory object store.
//!
//! Behaves like an S3 bucket as far as the adapter can observe: sorted keys,
//! bounded list pages, common-prefix roll-up, `NextMarker` only when a
//! delimiter was requested, and idempotent single deletes. Every request is
//! counted and failures can be queued per operation, which makes it the
//! stand-in backend for tests and dry runs.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use mediafs_common::backend::{
    BackendError, BackendFactory, CannedAcl, ListRequest, ListingPage, ObjectBackend,
    ObjectMetadata, ObjectSummary, PutObject, BATCH_DELETE_LIMIT,
};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Put,
    Get,
    Head,
    Delete,
    DeleteBatch,
    List,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub acl: CannedAcl,
    pub last_modified: DateTime<Utc>,
}

struct State {
    buckets: HashMap<String, BTreeMap<String, StoredObject>>,
    page_size: usize,
    calls: HashMap<Op, usize>,
    batch_sizes: Vec<usize>,
    list_requests: Vec<ListRequest>,
    failures: HashMap<Op, VecDeque<Option<u16>>>,
    clients: usize,
}

#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// A store whose list pages hold at most `page_size` entries.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                buckets: HashMap::new(),
                page_size: page_size.max(1),
                calls: HashMap::new(),
                batch_sizes: Vec::new(),
                list_requests: Vec::new(),
                failures: HashMap::new(),
                clients: 0,
            })),
        }
    }

    /// A factory handing out handles onto this store.
    pub fn factory(&self) -> BackendFactory {
        let backend = self.clone();
        Arc::new(move || -> Result<Box<dyn ObjectBackend>, BackendError> {
            backend.state.lock().unwrap().clients += 1;
            Ok(Box::new(backend.clone()))
        })
    }

    /// Seed an object without counting a request.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.insert_at(bucket, key, body, Utc::now());
    }

    pub fn insert_at(&self, bucket: &str, key: &str, body: impl Into<Bytes>, last_modified: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
                acl: CannedAcl::Private,
                last_modified,
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock().unwrap();
        state.buckets.get(bucket).and_then(|b| b.get(key)).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of requests of the given kind served so far.
    pub fn calls(&self, op: Op) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(&op).copied().unwrap_or(0)
    }

    /// Key counts of every batch delete received, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().batch_sizes.clone()
    }

    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.state.lock().unwrap().list_requests.clone()
    }

    /// Handles created through [`MemoryBackend::factory`].
    pub fn clients_created(&self) -> usize {
        self.state.lock().unwrap().clients
    }

    /// Make the next `op` request fail with the given HTTP status.
    pub fn fail_next(&self, op: Op, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(op).or_default().push_back(Some(status));
    }

    /// Let the next queued `op` request through; pairs with
    /// [`MemoryBackend::fail_next`] to fail a later request.
    pub fn pass_next(&self, op: Op) {
        let mut state = self.state.lock().unwrap();
        state.failures.entry(op).or_default().push_back(None);
    }

    fn begin(state: &mut State, op: Op) -> Result<(), BackendError> {
        *state.calls.entry(op).or_insert(0) += 1;
        match state.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(Some(status)) => Err(BackendError::Status {
                status,
                message: format!("injected {:?} failure", op),
            }),
            _ => Ok(()),
        }
    }
}

fn no_such_key(key: &str) -> BackendError {
    BackendError::Status {
        status: 404,
        message: format!("NoSuchKey: {}", key),
    }
}

/// Whether `key` sorts at or before the resume point of a listing.
fn before_marker(key: &str, marker: Option<&str>, delimiter: Option<&str>) -> bool {
    match marker {
        Some(m) => {
            key <= m || delimiter.map_or(false, |d| m.ends_with(d) && key.starts_with(m))
        }
        None => false,
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::Put)?;
        state.buckets.entry(bucket.to_string()).or_default().insert(
            object.key,
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                acl: object.acl,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::Get)?;
        state
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.body.clone())
            .ok_or_else(|| no_such_key(key))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::Head)?;
        state
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| ObjectMetadata {
                last_modified: o.last_modified,
                size: Some(o.body.len() as u64),
                content_type: Some(o.content_type.clone()),
            })
            .ok_or_else(|| no_such_key(key))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::Delete)?;
        if let Some(b) = state.buckets.get_mut(bucket) {
            b.remove(key);
        }
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::DeleteBatch)?;
        if keys.len() > BATCH_DELETE_LIMIT {
            return Err(BackendError::Status {
                status: 400,
                message: format!("MalformedXML: {} keys exceeds the batch limit", keys.len()),
            });
        }
        state.batch_sizes.push(keys.len());
        if let Some(b) = state.buckets.get_mut(bucket) {
            for key in keys {
                b.remove(key);
            }
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> Result<ListingPage, BackendError> {
        let mut state = self.state.lock().unwrap();
        Self::begin(&mut state, Op::List)?;
        state.list_requests.push(request.clone());

        let limit = request
            .max_keys
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(state.page_size);
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let marker = request.marker.as_deref();

        let mut page = ListingPage::default();
        let mut count = 0;
        let empty = BTreeMap::new();
        let objects = state.buckets.get(bucket).unwrap_or(&empty);

        for (key, object) in objects {
            if !key.starts_with(&request.prefix) || before_marker(key, marker, delimiter) {
                continue;
            }

            let rolled_up = delimiter.and_then(|d| {
                key[request.prefix.len()..]
                    .find(d)
                    .map(|i| key[..request.prefix.len() + i + d.len()].to_string())
            });
            if let Some(ref cp) = rolled_up {
                if page.common_prefixes.last() == Some(cp) {
                    continue;
                }
            }

            if count == limit {
                page.is_truncated = true;
                break;
            }
            count += 1;

            match rolled_up {
                Some(cp) => page.common_prefixes.push(cp),
                None => page.objects.push(ObjectSummary {
                    key: key.clone(),
                    size: object.body.len() as u64,
                    last_modified: object.last_modified,
                }),
            }
        }

        if page.is_truncated && delimiter.is_some() {
            page.next_marker = page.last_entry().map(|s| s.to_string());
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(page_size: usize) -> MemoryBackend {
        let backend = MemoryBackend::with_page_size(page_size);
        for key in [
            "media/a.txt",
            "media/docs/one.pdf",
            "media/docs/two.pdf",
            "media/photos/img.png",
            "media/z.txt",
            "other/x.txt",
        ] {
            backend.insert("assets", key, "data");
        }
        backend
    }

    #[tokio::test]
    async fn test_list_with_delimiter_rolls_up_prefixes() {
        let backend = seeded(1000);
        let page = backend
            .list_objects(
                "assets",
                &ListRequest {
                    prefix: "media/".to_string(),
                    delimiter: Some("/".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["media/a.txt", "media/z.txt"]);
        assert_eq!(page.common_prefixes, vec!["media/docs/", "media/photos/"]);
        assert!(!page.is_truncated);
    }

    #[tokio::test]
    async fn test_truncated_page_sets_marker_only_with_delimiter() {
        let backend = seeded(2);
        let delimited = backend
            .list_objects(
                "assets",
                &ListRequest {
                    prefix: "media/".to_string(),
                    delimiter: Some("/".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(delimited.is_truncated);
        assert_eq!(delimited.next_marker.as_deref(), Some("media/docs/"));

        let flat = backend
            .list_objects(
                "assets",
                &ListRequest {
                    prefix: "media/".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(flat.is_truncated);
        assert!(flat.next_marker.is_none());
        assert_eq!(flat.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_marker_skips_rolled_up_prefix() {
        let backend = seeded(1000);
        let page = backend
            .list_objects(
                "assets",
                &ListRequest {
                    prefix: "media/".to_string(),
                    delimiter: Some("/".to_string()),
                    marker: Some("media/docs/".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.common_prefixes, vec!["media/photos/"]);
        assert_eq!(page.objects.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let backend = seeded(1000);
        backend.fail_next(Op::Get, 403);
        let err = backend.get_object("assets", "media/a.txt").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(backend.get_object("assets", "media/a.txt").await.is_ok());
        assert_eq!(backend.calls(Op::Get), 2);
    }

    #[tokio::test]
    async fn test_batch_limit_enforced() {
        let backend = MemoryBackend::new();
        let keys: Vec<String> = (0..=BATCH_DELETE_LIMIT).map(|i| format!("media/{}", i)).collect();
        let err = backend.delete_objects("assets", &keys).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }
}
