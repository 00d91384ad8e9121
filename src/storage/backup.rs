//! Durable hand-off of the published selection
//!
//! The backup file holds exactly one MessagePack record (field names
//! included) with the candidate, both observations and the cycle time. It
//! is rewritten wholesale after every successful cycle and read once at
//! startup so a restart does not have to refetch every candidate.
//!
//! # Example
//!
//! ```no_run
//! use hindsight::storage::BackupStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = BackupStore::new("cache");
//! match store.load().await {
//!     Ok(Some(selection)) => println!("Restored {}", selection.candidate),
//!     Ok(None) => println!("No backup yet"),
//!     Err(e) => println!("Backup unreadable: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Selection;

/// Errors reading or writing the backup file
#[derive(Error, Debug)]
pub enum BackupError {
    /// The file exists but could not be opened, read or written
    #[error("Backup I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The selection could not be encoded
    #[error("Backup encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// The file content is not a valid selection record
    #[error("Backup decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl BackupError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the file was present but corrupt
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Encode a selection to any byte sink
pub fn write_backup<W: Write>(out: &mut W, selection: &Selection) -> Result<(), BackupError> {
    rmp_serde::encode::write_named(out, selection)?;
    Ok(())
}

/// Decode a selection from any byte source
pub fn read_backup<R: Read>(input: R) -> Result<Selection, BackupError> {
    Ok(rmp_serde::from_read(input)?)
}

/// File-backed store for the last published selection
#[derive(Debug, Clone)]
pub struct BackupStore {
    path: PathBuf,
}

impl BackupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the backup with `selection`
    ///
    /// Writes a sibling temp file first and renames it over the target, so
    /// a crash mid-write leaves the previous backup intact.
    pub async fn save(&self, selection: &Selection) -> Result<(), BackupError> {
        let mut bytes = Vec::new();
        write_backup(&mut bytes, selection)?;

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| BackupError::io(&temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| BackupError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Backup saved");
        Ok(())
    }

    /// Read the backup
    ///
    /// Returns `Ok(None)` when no backup file exists, and an error when the
    /// file exists but cannot be read or decoded.
    pub async fn load(&self) -> Result<Option<Selection>, BackupError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackupError::io(&self.path, e)),
        };

        let selection = read_backup(bytes.as_slice())?;
        tracing::debug!(path = %self.path.display(), "Backup loaded");
        Ok(Some(selection))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "backup".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
