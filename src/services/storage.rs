use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Extensions accepted as images, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Lower-cased extension of `filename` if it is one of [`ALLOWED_EXTENSIONS`].
pub fn image_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Metadata for one file in the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Aggregate usage of the upload directory and its filesystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageUsage {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub disk_free_bytes: u64,
    pub disk_total_bytes: u64,
}

/// Local directory holding uploaded images.
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(StorageError::Io)?;
            tracing::info!(path = %root.display(), "Created upload folder");
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Write `data` under `filename` and flush it to disk.
    ///
    /// Never overwrites: when the name is taken a `-N` suffix is inserted before the
    /// extension. Returns the name actually used.
    pub async fn persist(&self, filename: &str, data: &[u8]) -> Result<String, StorageError> {
        let (stem, ext) = match filename.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (filename, None),
        };

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = match (attempt, ext) {
                (0, _) => filename.to_string(),
                (n, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
                (n, None) => format!("{}-{}", stem, n),
            };

            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path_for(&candidate))
                .await;

            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };

            file.write_all(data).await.map_err(StorageError::Io)?;
            file.sync_all().await.map_err(StorageError::Io)?;
            return Ok(candidate);
        }

        Err(StorageError::NameExhausted(filename.to_string()))
    }

    /// Image files in the directory, newest first.
    pub async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(StorageError::Io)?;

        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Io)? {
            let metadata = entry.metadata().await.map_err(StorageError::Io)?;
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !metadata.is_file() || image_extension(&filename).is_none() {
                continue;
            }

            let modified = metadata.modified().map_err(StorageError::Io)?;
            files.push(StoredFile {
                filename,
                size: metadata.len(),
                created: created_time(&metadata)?.into(),
                modified: modified.into(),
            });
        }

        files.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(files)
    }

    /// Delete every file created more than `max_age_days` ago.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<Vec<String>, StorageError> {
        let max_age = Duration::from_secs(u64::from(max_age_days) * 24 * 60 * 60);
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut deleted = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(StorageError::Io)?;

        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Io)? {
            let metadata = entry.metadata().await.map_err(StorageError::Io)?;
            if !metadata.is_file() || created_time(&metadata)? >= cutoff {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            tokio::fs::remove_file(entry.path()).await.map_err(StorageError::Io)?;
            tracing::info!(filename = %filename, "Deleted old file");
            deleted.push(filename);
        }

        Ok(deleted)
    }

    pub async fn usage(&self) -> Result<StorageUsage, StorageError> {
        let mut total_files = 0;
        let mut total_size_bytes = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(StorageError::Io)?;

        while let Some(entry) = entries.next_entry().await.map_err(StorageError::Io)? {
            let metadata = entry.metadata().await.map_err(StorageError::Io)?;
            if metadata.is_file() {
                total_files += 1;
                total_size_bytes += metadata.len();
            }
        }

        let root = self.root.clone();
        let (disk_free_bytes, disk_total_bytes) = tokio::task::spawn_blocking(move || {
            Ok::<_, std::io::Error>((fs2::available_space(&root)?, fs2::total_space(&root)?))
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
        .map_err(StorageError::Io)?;

        Ok(StorageUsage {
            total_files,
            total_size_bytes,
            disk_free_bytes,
            disk_total_bytes,
        })
    }
}

// Birth time is not recorded on every filesystem; fall back to mtime there.
fn created_time(metadata: &std::fs::Metadata) -> Result<SystemTime, StorageError> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(StorageError::Io)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No free file name left for {0}")]
    NameExhausted(String),
}
