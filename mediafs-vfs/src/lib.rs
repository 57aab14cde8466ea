pub mod error;
pub mod filter;
pub mod listing;
pub mod media_fs;
pub mod memory;
pub mod path;

pub use error::FsError;
pub use media_fs::{FileSystem, MediaFileSystem, NEVER};
