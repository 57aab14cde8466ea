pub mod s3;
pub mod xml;

use std::sync::Arc;

use anyhow::Context;
use reqwest::Client;

use mediafs_common::backend::{BackendError, BackendFactory, ObjectBackend};
use mediafs_common::config::StorageConfig;

use self::s3::{S3Client, S3Settings};

/// Build the client factory the filesystem adapter draws a fresh S3 handle
/// from on every operation.
///
/// The HTTP connection pool is created once here and shared by all handles.
pub fn factory(config: &StorageConfig) -> anyhow::Result<BackendFactory> {
    let http = Client::builder()
        .timeout(config.timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let settings = S3Settings {
        region: config.region.clone(),
        endpoint: config.endpoint.clone(),
        access_key_id: config.access_key_id.clone(),
        secret_access_key: config.secret_access_key.clone(),
    };

    Ok(Arc::new(move || -> Result<Box<dyn ObjectBackend>, BackendError> {
        Ok(Box::new(S3Client::new(settings.clone(), http.clone())))
    }))
}
