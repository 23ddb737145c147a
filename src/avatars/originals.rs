//! Canonical original image per fingerprint

use std::sync::Arc;
use tracing::{debug, info};

use crate::avatars::codec::ImageCodec;
use crate::avatars::storage::{AvatarStorage, ensure_dir, write_atomic};
use crate::config::defaults::{MAX_ORIGINAL_EDGE, MAX_UPLOAD_BYTES};
use crate::errors::{AvatarError, AvatarResult};
use crate::models::{AvatarKey, Fingerprint, OriginalImage, StoredOriginal};

#[derive(Debug, Clone)]
pub struct OriginalStore {
    storage: AvatarStorage,
    codec: Arc<dyn ImageCodec>,
}

impl OriginalStore {
    pub fn new(storage: AvatarStorage, codec: Arc<dyn ImageCodec>) -> Self {
        Self { storage, codec }
    }

    /// Validate, bound and persist an uploaded image as the original for `fingerprint`
    ///
    /// The image is scaled down (never up) so its longest edge is at most 512px
    /// and written in its own format. A copy is also written into the size
    /// bucket matching its longest edge, so the first fetch at the natural size
    /// is already cached.
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        uploaded: &[u8],
    ) -> AvatarResult<StoredOriginal> {
        if uploaded.len() > MAX_UPLOAD_BYTES {
            return Err(AvatarError::PayloadTooLarge {
                size: uploaded.len(),
                max_size: MAX_UPLOAD_BYTES,
            });
        }

        let storage = self.storage.clone();
        let codec = Arc::clone(&self.codec);
        let fingerprint = fingerprint.clone();
        let bytes = uploaded.to_vec();

        let stored = tokio::task::spawn_blocking(move || -> AvatarResult<StoredOriginal> {
            let decoded = codec.decode(&bytes)?;
            let bounded = if decoded.longest_edge() > MAX_ORIGINAL_EDGE {
                codec.resize_to_fit(&decoded, MAX_ORIGINAL_EDGE)
            } else {
                decoded
            };
            let encoded = codec.encode(&bounded, bounded.format)?;

            // Both directories exist before anything is replaced, so a failed
            // upload leaves the previous original in place
            let size_class = bounded.longest_edge();
            let original_dir = storage.original_dir();
            std::fs::create_dir_all(&original_dir)
                .map_err(|e| AvatarError::storage(&original_dir, e))?;
            ensure_dir(&storage.bucket_dir(size_class))?;

            // The seed must be written after the original to count as fresh
            write_atomic(&storage.original_path(&fingerprint), &encoded)?;
            let seeded = storage.thumbnail_path(
                &AvatarKey::Fingerprint(fingerprint.clone()),
                size_class,
                bounded.format,
            );
            write_atomic(&seeded, &encoded)?;
            debug!("Seeded thumbnail cache at {}", seeded.display());

            Ok(StoredOriginal {
                fingerprint,
                format: bounded.format,
                width: bounded.width(),
                height: bounded.height(),
                size_class,
            })
        })
        .await??;

        info!(
            "Stored original for {} ({}x{} {}, size class {})",
            stored.fingerprint, stored.width, stored.height, stored.format, stored.size_class
        );

        Ok(stored)
    }

    /// Look up the stored original, `NotFound` if none was ever uploaded
    pub async fn get(&self, fingerprint: &Fingerprint) -> AvatarResult<OriginalImage> {
        let path = self.storage.original_path(fingerprint);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(OriginalImage {
                key: AvatarKey::Fingerprint(fingerprint.clone()),
                modified: metadata
                    .modified()
                    .map_err(|e| AvatarError::storage(&path, e))?,
                path,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AvatarError::NotFound {
                fingerprint: fingerprint.to_string(),
            }),
            Err(e) => Err(AvatarError::storage(&path, e)),
        }
    }

    /// The fallback original used for fingerprints without an upload
    pub async fn default_avatar(&self) -> AvatarResult<OriginalImage> {
        let path = self.storage.default_avatar_path();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| AvatarError::storage(&path, e))?;

        Ok(OriginalImage {
            key: AvatarKey::Default,
            modified: metadata
                .modified()
                .map_err(|e| AvatarError::storage(&path, e))?,
            path,
        })
    }
}
