//! Avatar service
//!
//! Wires the fingerprint resolver, original store, thumbnail cache and
//! recency log together behind the three operations the HTTP layer needs.

use std::sync::Arc;
use tracing::info;

use crate::avatars::codec::ImageCodec;
use crate::avatars::fingerprint;
use crate::avatars::originals::OriginalStore;
use crate::avatars::placeholder::{self, PLACEHOLDER_EDGE};
use crate::avatars::recent::{RecencyLog, RecentAvatars};
use crate::avatars::storage::{AvatarStorage, write_atomic};
use crate::avatars::thumbnails::ThumbnailCache;
use crate::errors::AvatarResult;
use crate::models::{AvatarFormat, Fingerprint, ResolvedThumbnail, StoredOriginal, ThumbnailRequest};

#[derive(Debug, Clone)]
pub struct AvatarService {
    storage: AvatarStorage,
    codec: Arc<dyn ImageCodec>,
    originals: OriginalStore,
    thumbnails: ThumbnailCache,
    recent: RecencyLog,
}

impl AvatarService {
    pub fn new(storage: AvatarStorage, codec: Arc<dyn ImageCodec>) -> Self {
        let originals = OriginalStore::new(storage.clone(), Arc::clone(&codec));
        let thumbnails = ThumbnailCache::new(storage.clone(), originals.clone(), Arc::clone(&codec));
        let recent = RecencyLog::new(storage.recent_log_path());

        Self {
            storage,
            codec,
            originals,
            thumbnails,
            recent,
        }
    }

    pub fn storage(&self) -> &AvatarStorage {
        &self.storage
    }

    /// Prepare the storage layout and make sure a default avatar exists
    pub async fn initialize(&self) -> AvatarResult<()> {
        self.storage.ensure_storage_dirs().await?;

        let default_path = self.storage.default_avatar_path();
        if AvatarStorage::modified(&default_path).await?.is_some() {
            return Ok(());
        }

        let codec = Arc::clone(&self.codec);
        let target = default_path.clone();
        tokio::task::spawn_blocking(move || -> AvatarResult<()> {
            let rendered = placeholder::render(PLACEHOLDER_EDGE);
            let encoded = codec.encode(&rendered, AvatarFormat::Png)?;
            write_atomic(&target, &encoded)
        })
        .await??;

        info!("Wrote placeholder default avatar to {}", default_path.display());
        Ok(())
    }

    /// Store an uploaded image for `email` and record it as the newest upload
    pub async fn upload(&self, email: &str, bytes: &[u8]) -> AvatarResult<StoredOriginal> {
        let fingerprint = fingerprint::resolve(email)?;
        let stored = self.originals.put(&fingerprint, bytes).await?;
        self.recent.record(&fingerprint).await?;
        Ok(stored)
    }

    /// Thumbnail for a fingerprint, falling back to the default avatar
    pub async fn fetch(
        &self,
        fingerprint: &Fingerprint,
        request: &ThumbnailRequest,
    ) -> AvatarResult<ResolvedThumbnail> {
        self.thumbnails.resolve(fingerprint, request).await
    }

    /// Most recently uploaded fingerprints, newest first
    pub async fn recent(&self, limit: usize) -> AvatarResult<RecentAvatars> {
        self.recent.recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatars::codec::ImageCrateCodec;
    use crate::errors::AvatarError;
    use crate::models::AvatarKey;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> AvatarService {
        AvatarService::new(
            AvatarStorage::new(temp.path().join("avatars")),
            Arc::new(ImageCrateCodec::new()),
        )
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("Failed to write PNG to memory");
        bytes
    }

    #[tokio::test]
    async fn test_initialize_writes_placeholder_once() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        service.initialize().await.unwrap();
        let default_path = service.storage().default_avatar_path();
        let placeholder = image::open(&default_path).unwrap();
        assert_eq!((placeholder.width(), placeholder.height()), (512, 512));
        assert!(service.storage().original_dir().is_dir());

        std::fs::write(&default_path, png_bytes(16, 16)).unwrap();
        service.initialize().await.unwrap();
        let kept = image::open(&default_path).unwrap();
        assert_eq!(kept.width(), 16);
    }

    #[tokio::test]
    async fn test_upload_records_recency_and_serves_thumbnail() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        service.initialize().await.unwrap();

        let stored = service
            .upload(" Someone@Example.com ", &png_bytes(40, 40))
            .await
            .unwrap();
        assert_eq!(stored.fingerprint, fingerprint::resolve("someone@example.com").unwrap());

        let recent: Vec<_> = service.recent(10).await.unwrap().collect();
        assert_eq!(recent, vec![stored.fingerprint.clone()]);

        let request = ThumbnailRequest::new(20, AvatarFormat::Png).unwrap();
        let thumbnail = service.fetch(&stored.fingerprint, &request).await.unwrap();
        assert_eq!(thumbnail.key, AvatarKey::Fingerprint(stored.fingerprint));
        assert!(thumbnail.path.exists());
    }

    #[tokio::test]
    async fn test_rejected_upload_is_not_recorded() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        service.initialize().await.unwrap();

        assert!(matches!(
            service.upload("not-an-address", &png_bytes(4, 4)).await,
            Err(AvatarError::InvalidAddress { .. })
        ));
        assert!(matches!(
            service.upload("a@example.com", b"plain text").await,
            Err(AvatarError::UnsupportedFormat { .. })
        ));
        assert_eq!(service.recent(10).await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_gets_default_avatar() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        service.initialize().await.unwrap();

        let fp = fingerprint::resolve("ghost@example.com").unwrap();
        let request = ThumbnailRequest::new(80, AvatarFormat::Gif).unwrap();
        let thumbnail = service.fetch(&fp, &request).await.unwrap();

        assert_eq!(thumbnail.key, AvatarKey::Default);
        assert!(thumbnail.path.ends_with("80/default.gif"));
    }
}
