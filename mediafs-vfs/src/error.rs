use mediafs_common::backend::BackendError;

/// Filesystem-level failure kinds surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Storage backend error: {0}")]
    Transport(#[source] BackendError),
    #[error("Invalid path {0:?}: `.` and `..` segments are not supported")]
    InvalidPath(String),
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

/// Classify a backend failure by the HTTP status it carries.
impl From<BackendError> for FsError {
    fn from(err: BackendError) -> Self {
        match err.status() {
            Some(404) => FsError::NotFound(err.to_string()),
            Some(401) | Some(403) => FsError::AccessDenied(err.to_string()),
            _ => FsError::Transport(err),
        }
    }
}
