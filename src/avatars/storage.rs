//! On-disk layout of the avatar store
//!
//! ```text
//! <base>/original/<fingerprint>   canonical original per fingerprint
//! <base>/default.png              fallback original
//! <base>/<size>/<key>.<format>    thumbnails, one directory per size
//! <base>/recent.log               one fingerprint per line, upload order
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::errors::{AvatarError, AvatarResult};
use crate::models::{AvatarFormat, AvatarKey, Fingerprint};

const ORIGINAL_DIR: &str = "original";
const DEFAULT_AVATAR_FILE: &str = "default.png";
const RECENT_LOG_FILE: &str = "recent.log";
const TEMP_PREFIX: &str = ".tmp-";
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct AvatarStorage {
    base_dir: PathBuf,
}

impl AvatarStorage {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn original_dir(&self) -> PathBuf {
        self.base_dir.join(ORIGINAL_DIR)
    }

    pub fn original_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.original_dir().join(fingerprint.as_str())
    }

    pub fn default_avatar_path(&self) -> PathBuf {
        self.base_dir.join(DEFAULT_AVATAR_FILE)
    }

    /// Directory holding every thumbnail of one size
    pub fn bucket_dir(&self, size: u32) -> PathBuf {
        self.base_dir.join(size.to_string())
    }

    pub fn thumbnail_path(&self, key: &AvatarKey, size: u32, format: AvatarFormat) -> PathBuf {
        self.bucket_dir(size)
            .join(format!("{}.{}", key.as_str(), format.extension()))
    }

    pub fn recent_log_path(&self) -> PathBuf {
        self.base_dir.join(RECENT_LOG_FILE)
    }

    /// Create the base and `original/` directories
    pub async fn ensure_storage_dirs(&self) -> AvatarResult<()> {
        let original_dir = self.original_dir();
        if !original_dir.exists() {
            fs::create_dir_all(&original_dir)
                .await
                .map_err(|e| AvatarError::storage(&original_dir, e))?;
        }
        Ok(())
    }

    /// Modification time of a file, `None` when it does not exist
    pub async fn modified(path: &Path) -> AvatarResult<Option<SystemTime>> {
        match fs::metadata(path).await {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .map_err(|e| AvatarError::storage(path, e))?;
                Ok(Some(modified))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AvatarError::storage(path, e)),
        }
    }
}

/// Create a directory whose parent exists. Concurrent creators are fine:
/// "already exists" counts as success, anything else is an error.
pub fn ensure_dir(dir: &Path) -> AvatarResult<()> {
    match std::fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(AvatarError::storage(dir, e)),
    }
}

/// Write a file through a temp file in the same directory and rename it into
/// place, so readers see either the old content or the complete new content.
pub fn write_atomic(path: &Path, contents: &[u8]) -> AvatarResult<()> {
    let dir = path.parent().ok_or_else(|| {
        AvatarError::storage(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    // Temp files default to owner-only; published files are world-readable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(FILE_MODE));
    }

    let mut temp = builder
        .tempfile_in(dir)
        .map_err(|e| AvatarError::storage(dir, e))?;

    temp.write_all(contents)
        .and_then(|_| temp.flush())
        .map_err(|e| AvatarError::storage(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| AvatarError::storage(path, e.error))?;

    Ok(())
}
