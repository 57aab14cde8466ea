//! mediafs command-line host.
//!
//! Loads the storage configuration, builds the bucket-backed filesystem once
//! and runs a single filesystem operation against it.
//!
//! Usage:
//!   mediafs --config mediafs.toml ls /photos
//!   mediafs put ./img.png /photos/img.png
//!   mediafs rmdir /tmp

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mediafs_common::config::StorageConfig;
use mediafs_vfs::{FileSystem, MediaFileSystem, NEVER};

const DEFAULT_CONFIG_PATH: &str = "mediafs.toml";

/// Hierarchical file operations on an S3 bucket.
#[derive(Parser, Debug)]
#[command(name = "mediafs")]
struct Args {
    /// Path to the storage configuration file
    #[arg(long, env = "MEDIAFS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a local file
    Put { local: PathBuf, path: String },
    /// Download a file to a local path, or to stdout
    Get { path: String, local: Option<PathBuf> },
    /// Delete a file
    Rm { path: String },
    /// Delete a directory and everything below it
    Rmdir { path: String },
    /// List subdirectories and files of a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Filename filter such as `report*.csv`
        #[arg(long)]
        filter: Option<String>,
    },
    /// List subdirectories only
    Dirs {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show existence, modification time and URL of a file
    Stat { path: String },
    /// Print the public URL of a file
    Url { path: String },
    /// Strip hostname and key prefix from a URL or path
    Relative { path: String },
}

async fn run(fs: &dyn FileSystem, command: Command, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Put { local, path } => {
            let mut file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("Failed to open {}", local.display()))?;
            fs.add_file(&path, &mut file, true).await?;
            info!(path = %path, "Uploaded");
            writeln!(out, "{}", fs.get_url(&path))?;
        }
        Command::Get { path, local } => {
            let mut reader = fs.open_file(&path).await?;
            match local {
                Some(local) => {
                    let mut file = tokio::fs::File::create(&local)
                        .await
                        .with_context(|| format!("Failed to create {}", local.display()))?;
                    let n = tokio::io::copy(&mut reader, &mut file).await?;
                    info!(path = %path, bytes = n, "Downloaded");
                }
                None => out.write_all(reader.get_ref())?,
            }
        }
        Command::Rm { path } => fs.delete_file(&path).await?,
        Command::Rmdir { path } => fs.delete_directory(&path, true).await?,
        Command::Ls { path, filter } => {
            for dir in fs.get_directories(&path).await? {
                writeln!(out, "{}/", dir)?;
            }
            for file in fs.get_files(&path, filter.as_deref()).await? {
                writeln!(out, "{}", file)?;
            }
        }
        Command::Dirs { path } => {
            for dir in fs.get_directories(&path).await? {
                writeln!(out, "{}", dir)?;
            }
        }
        Command::Stat { path } => {
            if !fs.file_exists(&path).await? {
                anyhow::bail!("{}: no such file", path);
            }
            let modified = fs.get_last_modified(&path).await?;
            if modified != NEVER {
                writeln!(out, "modified: {}", modified.to_rfc3339())?;
            }
            writeln!(out, "url: {}", fs.get_url(&path))?;
        }
        Command::Url { path } => writeln!(out, "{}", fs.get_url(&path))?,
        Command::Relative { path } => writeln!(out, "{}", fs.get_relative_path(&path))?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = StorageConfig::load(&args.config)?;
    info!(bucket = %config.bucket, prefix = %config.prefix, "Storage configuration loaded");

    let factory = mediafs_s3::factory(&config)?;
    let fs: Arc<dyn FileSystem> = Arc::new(MediaFileSystem::new(&config, factory));

    let mut stdout = std::io::stdout().lock();
    run(fs.as_ref(), args.command, &mut stdout).await
}
