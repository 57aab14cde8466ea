use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Largest number of keys a single multi-object delete may carry.
pub const BATCH_DELETE_LIMIT: usize = 1000;

/// Canned access-control policy applied to an object at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
}

impl CannedAcl {
    /// Value of the `x-amz-acl` header.
    pub fn as_header(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
        }
    }
}

/// A single object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Bytes,
    pub acl: CannedAcl,
    pub content_type: String,
}

/// Parameters of one list call.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    /// Resume listing after this key (exclusive).
    pub marker: Option<String>,
    pub max_keys: Option<usize>,
}

/// An object entry returned by a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One backend response to a list call.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub objects: Vec<ObjectSummary>,
    /// Pseudo-directories, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_marker: Option<String>,
}

impl ListingPage {
    /// Greatest key or common prefix on this page, used to resume a truncated
    /// listing when the backend did not hand out a marker.
    pub fn last_entry(&self) -> Option<&str> {
        let last_key = self.objects.last().map(|o| o.key.as_str());
        let last_prefix = self.common_prefixes.last().map(|p| p.as_str());
        match (last_key, last_prefix) {
            (Some(k), Some(p)) => Some(k.max(p)),
            (k, p) => k.or(p),
        }
    }
}

/// Response of a metadata-only request.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub last_modified: DateTime<Utc>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("batch delete failed for {} key(s)", .failed.len())]
    BatchDelete { failed: Vec<String> },
    #[error("malformed backend response: {0}")]
    Malformed(String),
    #[error("backend client unavailable: {0}")]
    Client(String),
}

impl BackendError {
    /// HTTP status the backend answered with, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http(e) => e.status().map(|s| s.as_u16()),
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Object-storage capability the filesystem adapter is built on.
///
/// Implementations perform exactly one backend request per call; pagination,
/// batching and error classification belong to the caller.
#[async_trait::async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Store an object, replacing any existing one under the same key.
    async fn put_object(&self, bucket: &str, object: PutObject) -> Result<(), BackendError>;

    /// Fetch a whole object body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BackendError>;

    /// Fetch object metadata without the body.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError>;

    /// Remove a single object.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError>;

    /// Remove up to [`BATCH_DELETE_LIMIT`] objects in one request.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), BackendError>;

    /// Return a single page of a prefix listing.
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> Result<ListingPage, BackendError>;
}

/// Produces a fresh backend handle for each adapter operation.
pub type BackendFactory =
    Arc<dyn Fn() -> Result<Box<dyn ObjectBackend>, BackendError> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    fn object(key: &str) -> ObjectSummary {
        ObjectSummary {
            key: key.to_string(),
            size: 0,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_last_entry() {
        let page = ListingPage {
            objects: vec![object("media/a.txt"), object("media/c.txt")],
            common_prefixes: vec!["media/b/".to_string()],
            is_truncated: true,
            next_marker: None,
        };
        assert_eq!(page.last_entry(), Some("media/c.txt"));

        let page = ListingPage {
            objects: vec![object("media/a.txt")],
            common_prefixes: vec!["media/z/".to_string()],
            ..Default::default()
        };
        assert_eq!(page.last_entry(), Some("media/z/"));

        assert_eq!(ListingPage::default().last_entry(), None);
    }

    #[test]
    fn test_status_code() {
        let err = BackendError::Status {
            status: 404,
            message: "NoSuchKey".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(BackendError::Malformed("x".into()).status(), None);
    }

    #[test]
    fn test_canned_acl_header() {
        assert_eq!(CannedAcl::PublicRead.as_header(), "public-read");
        assert_eq!(CannedAcl::Private.as_header(), "private");
    }
}
