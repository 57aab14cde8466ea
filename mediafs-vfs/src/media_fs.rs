//! Filesystem operations over an object-storage bucket.
//!
//! [`MediaFileSystem`] answers file and directory requests using only the
//! flat key operations an object store provides. Directories are key
//! prefixes ending in `/`, listings are prefix/delimiter queries, and
//! directory removal is a listing followed by batched deletes.
//!
//! Each operation draws its own backend handle from the injected factory and
//! drops it before returning, so one instance can serve concurrent callers
//! for the life of the process.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use mediafs_common::backend::{
    BackendFactory, CannedAcl, ListRequest, ObjectBackend, PutObject, BATCH_DELETE_LIMIT,
};
use mediafs_common::config::StorageConfig;

use crate::error::FsError;
use crate::filter::FileFilter;
use crate::listing;
use crate::path::{has_dot_segments, PathResolver, DELIMITER};

/// Timestamp reported for objects that do not exist.
pub const NEVER: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Generic file-storage capability a host application programs against.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Store `content` at `path`. Existing objects are always replaced.
    async fn add_file(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        overwrite: bool,
    ) -> Result<(), FsError>;

    /// Store a file from the local disk. Not every backend can.
    async fn add_file_physical(
        &self,
        path: &str,
        physical_path: &Path,
        overwrite: bool,
        copy: bool,
    ) -> Result<(), FsError>;

    fn can_add_physical(&self) -> bool;

    /// Whole file contents, positioned at the start.
    async fn open_file(&self, path: &str) -> Result<Cursor<Bytes>, FsError>;

    async fn delete_file(&self, path: &str) -> Result<(), FsError>;

    async fn file_exists(&self, path: &str) -> Result<bool, FsError>;

    /// Last modification time, or [`NEVER`] when the file does not exist.
    async fn get_last_modified(&self, path: &str) -> Result<DateTime<Utc>, FsError>;

    async fn get_created(&self, path: &str) -> Result<DateTime<Utc>, FsError>;

    async fn get_size(&self, path: &str) -> Result<u64, FsError>;

    /// Names of the immediate subdirectories of `path`.
    async fn get_directories(&self, path: &str) -> Result<Vec<String>, FsError>;

    async fn directory_exists(&self, path: &str) -> Result<bool, FsError>;

    /// Names of the files directly inside `path`, optionally filtered by a
    /// `name*.ext` pattern.
    async fn get_files(&self, path: &str, filter: Option<&str>) -> Result<Vec<String>, FsError>;

    async fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), FsError>;

    fn get_url(&self, path: &str) -> String;

    fn get_full_path(&self, path: &str) -> String;

    fn get_relative_path(&self, full_path_or_url: &str) -> String;
}

pub struct MediaFileSystem {
    bucket: String,
    resolver: PathResolver,
    factory: BackendFactory,
}

impl MediaFileSystem {
    pub fn new(config: &StorageConfig, factory: BackendFactory) -> Self {
        Self {
            bucket: config.bucket.clone(),
            resolver: PathResolver::from_config(config),
            factory,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key a request should address. Dot segments are refused: the HTTP
    /// layer would collapse them in the URL but not in the signed path.
    fn key(&self, path: &str, is_dir: bool) -> Result<String, FsError> {
        if has_dot_segments(path) {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        Ok(self.resolver.resolve(path, is_dir))
    }

    fn client(&self) -> Result<Box<dyn ObjectBackend>, FsError> {
        Ok((self.factory)()?)
    }

    fn delimited(prefix: String) -> ListRequest {
        ListRequest {
            prefix,
            delimiter: Some(DELIMITER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl FileSystem for MediaFileSystem {
    async fn add_file(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
        _overwrite: bool,
    ) -> Result<(), FsError> {
        let key = self.key(path, false)?;
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await?;

        let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        let size = buf.len();

        let client = self.client()?;
        client
            .put_object(
                &self.bucket,
                PutObject {
                    key: key.clone(),
                    body: Bytes::from(buf),
                    acl: CannedAcl::PublicRead,
                    content_type,
                },
            )
            .await?;

        debug!(key = %key, size, "File added");
        Ok(())
    }

    async fn add_file_physical(
        &self,
        _path: &str,
        _physical_path: &Path,
        _overwrite: bool,
        _copy: bool,
    ) -> Result<(), FsError> {
        Err(FsError::NotSupported("adding files from a physical path"))
    }

    fn can_add_physical(&self) -> bool {
        false
    }

    async fn open_file(&self, path: &str) -> Result<Cursor<Bytes>, FsError> {
        let key = self.key(path, false)?;
        let client = self.client()?;
        let body = client.get_object(&self.bucket, &key).await?;
        debug!(key = %key, size = body.len(), "File opened");
        Ok(Cursor::new(body))
    }

    async fn delete_file(&self, path: &str) -> Result<(), FsError> {
        let key = self.key(path, false)?;
        let client = self.client()?;
        match client.delete_object(&self.bucket, &key).await.map_err(FsError::from) {
            Ok(()) | Err(FsError::NotFound(_)) => {
                debug!(key = %key, "File deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn file_exists(&self, path: &str) -> Result<bool, FsError> {
        let key = self.key(path, false)?;
        let client = self.client()?;
        match client.head_object(&self.bucket, &key).await.map_err(FsError::from) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_last_modified(&self, path: &str) -> Result<DateTime<Utc>, FsError> {
        let key = self.key(path, false)?;
        let client = self.client()?;
        match client.head_object(&self.bucket, &key).await.map_err(FsError::from) {
            Ok(meta) => Ok(meta.last_modified),
            Err(FsError::NotFound(_)) => Ok(NEVER),
            Err(e) => Err(e),
        }
    }

    /// Object stores keep no creation time without versioning, so this
    /// reports the last modification time.
    async fn get_created(&self, path: &str) -> Result<DateTime<Utc>, FsError> {
        self.get_last_modified(path).await
    }

    async fn get_size(&self, _path: &str) -> Result<u64, FsError> {
        Err(FsError::NotSupported("file size lookup"))
    }

    async fn get_directories(&self, path: &str) -> Result<Vec<String>, FsError> {
        let dir_key = self.key(path, true)?;
        let client = self.client()?;

        let pages = listing::list_all(client.as_ref(), &self.bucket, Self::delimited(dir_key.clone()));
        let prefixes = listing::collect_prefixes(pages).await?;

        Ok(prefixes
            .iter()
            .map(|p| self.resolver.child_name(&dir_key, p))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect())
    }

    async fn directory_exists(&self, path: &str) -> Result<bool, FsError> {
        let dir_key = self.key(path, true)?;
        let client = self.client()?;
        let page = client
            .list_objects(
                &self.bucket,
                &ListRequest {
                    prefix: dir_key,
                    max_keys: Some(1),
                    ..Default::default()
                },
            )
            .await?;
        Ok(!page.objects.is_empty())
    }

    async fn get_files(&self, path: &str, filter: Option<&str>) -> Result<Vec<String>, FsError> {
        let dir_key = self.key(path, true)?;
        let filter = filter.map(FileFilter::parse).unwrap_or_default();
        let client = self.client()?;

        let request = Self::delimited(format!("{}{}", dir_key, filter.name_prefix));
        let pages = listing::list_all(client.as_ref(), &self.bucket, request);
        let objects = listing::collect_objects(pages).await?;

        Ok(objects
            .iter()
            .map(|o| self.resolver.child_name(&dir_key, &o.key))
            .filter(|name| filter.matches(name))
            .map(|name| name.to_string())
            .collect())
    }

    /// Removes every object under `path`. Object keys are flat, so the prefix
    /// listing already reaches all depths and `recursive` makes no
    /// difference. Batches are not transactional: when one fails, earlier
    /// batches stay deleted and a retry only finds what is left.
    async fn delete_directory(&self, path: &str, _recursive: bool) -> Result<(), FsError> {
        let dir_key = self.key(path, true)?;
        let client = self.client()?;

        let request = ListRequest {
            prefix: dir_key.clone(),
            ..Default::default()
        };
        let objects = listing::collect_objects(listing::list_all(client.as_ref(), &self.bucket, request)).await?;
        let keys: Vec<String> = objects.into_iter().map(|o| o.key).collect();

        let mut deleted = 0;
        for (batch, chunk) in keys.chunks(BATCH_DELETE_LIMIT).enumerate() {
            if let Err(e) = client.delete_objects(&self.bucket, chunk).await {
                warn!(
                    prefix = %dir_key,
                    batch,
                    deleted,
                    remaining = keys.len() - deleted,
                    error = %e,
                    "Directory delete batch failed"
                );
                return Err(e.into());
            }
            deleted += chunk.len();
        }

        info!(prefix = %dir_key, objects = deleted, "Directory deleted");
        Ok(())
    }

    fn get_url(&self, path: &str) -> String {
        self.resolver.url(path)
    }

    fn get_full_path(&self, path: &str) -> String {
        path.to_string()
    }

    fn get_relative_path(&self, full_path_or_url: &str) -> String {
        self.resolver.relative_path(full_path_or_url)
    }
}
