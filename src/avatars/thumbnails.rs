//! Thumbnail cache
//!
//! Thumbnails live at `<size>/<key>.<format>` and are rendered from the
//! original on demand. A thumbnail counts as fresh while its modification time
//! is strictly later than the original's; anything else is regenerated. When a
//! fingerprint has no original the default avatar is rendered instead and
//! cached under the `default` key, shared by every such fingerprint.
//!
//! Generation is single-flight per `(key, size, format)`. Concurrent requests
//! for the same thumbnail queue on one async mutex; whoever gets it first
//! renders, the rest re-check and reuse the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::avatars::codec::ImageCodec;
use crate::avatars::originals::OriginalStore;
use crate::avatars::storage::{AvatarStorage, ensure_dir, write_atomic};
use crate::errors::{AvatarError, AvatarResult};
use crate::models::{
    AvatarFormat, AvatarKey, Fingerprint, OriginalImage, ResolvedThumbnail, ThumbnailRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThumbnailId {
    key: AvatarKey,
    size: u32,
    format: AvatarFormat,
}

/// Holds the source modification time of the last thumbnail rendered under it
type GenerationSlot = Arc<Mutex<Option<SystemTime>>>;

#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    storage: AvatarStorage,
    originals: OriginalStore,
    codec: Arc<dyn ImageCodec>,
    in_flight: Arc<Mutex<HashMap<ThumbnailId, GenerationSlot>>>,
}

impl ThumbnailCache {
    pub fn new(storage: AvatarStorage, originals: OriginalStore, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            storage,
            originals,
            codec,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Locate (rendering if needed) the thumbnail for `fingerprint`
    pub async fn resolve(
        &self,
        fingerprint: &Fingerprint,
        request: &ThumbnailRequest,
    ) -> AvatarResult<ResolvedThumbnail> {
        let source = match self.originals.get(fingerprint).await {
            Ok(original) => original,
            Err(AvatarError::NotFound { .. }) => {
                debug!("No original for {}, falling back to default avatar", fingerprint);
                self.originals.default_avatar().await?
            }
            Err(e) => return Err(e),
        };

        let id = ThumbnailId {
            key: source.key.clone(),
            size: request.size(),
            format: request.format(),
        };
        let target = self.storage.thumbnail_path(&id.key, id.size, id.format);

        if is_fresh(&target, source.modified).await? {
            debug!("Thumbnail cache hit: {}", target.display());
            return Ok(resolved(id, target, false));
        }

        let slot = self.acquire_slot(&id).await;
        let outcome = self.generate_once(&slot, &source, &target, request).await;
        self.release_slot(&id, slot).await;

        let regenerated = outcome?;
        Ok(resolved(id, target, regenerated))
    }

    /// Render under the slot lock unless a fresh thumbnail appeared meanwhile
    async fn generate_once(
        &self,
        slot: &GenerationSlot,
        source: &OriginalImage,
        target: &Path,
        request: &ThumbnailRequest,
    ) -> AvatarResult<bool> {
        let mut rendered_from = slot.lock().await;

        let already_rendered = *rendered_from == Some(source.modified) && target.exists();
        if already_rendered || is_fresh(target, source.modified).await? {
            debug!("Thumbnail rendered by a concurrent request: {}", target.display());
            return Ok(false);
        }

        debug!("Thumbnail cache miss: {}", target.display());
        self.render(source, target, request).await?;
        *rendered_from = Some(source.modified);

        info!(
            "Rendered {}px {} thumbnail for {}",
            request.size(),
            request.format(),
            source.key
        );
        Ok(true)
    }

    async fn render(
        &self,
        source: &OriginalImage,
        target: &Path,
        request: &ThumbnailRequest,
    ) -> AvatarResult<()> {
        let codec = Arc::clone(&self.codec);
        let source_path = source.path.clone();
        let target = target.to_path_buf();
        let bucket = self.storage.bucket_dir(request.size());
        let (size, format) = (request.size(), request.format());

        tokio::task::spawn_blocking(move || -> AvatarResult<()> {
            let bytes =
                std::fs::read(&source_path).map_err(|e| AvatarError::storage(&source_path, e))?;
            let decoded = codec.decode(&bytes)?;
            let resized = codec.resize_to_fit(&decoded, size);
            let encoded = codec.encode(&resized, format)?;

            ensure_dir(&bucket)?;
            write_atomic(&target, &encoded)
        })
        .await?
    }

    async fn acquire_slot(&self, id: &ThumbnailId) -> GenerationSlot {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(id.clone()).or_default())
    }

    /// Drop our handle and forget the slot once nobody else holds it
    async fn release_slot(&self, id: &ThumbnailId, slot: GenerationSlot) {
        let mut in_flight = self.in_flight.lock().await;
        drop(slot);
        if in_flight
            .get(id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            in_flight.remove(id);
        }
    }

    #[cfg(test)]
    async fn in_flight_len(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

async fn is_fresh(target: &Path, source_modified: SystemTime) -> AvatarResult<bool> {
    Ok(AvatarStorage::modified(target)
        .await?
        .is_some_and(|thumbnail_modified| thumbnail_modified > source_modified))
}

fn resolved(id: ThumbnailId, path: PathBuf, regenerated: bool) -> ResolvedThumbnail {
    ResolvedThumbnail {
        key: id.key,
        path,
        size: id.size,
        format: id.format,
        regenerated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatars::codec::{DecodedImage, ImageCrateCodec};
    use crate::avatars::fingerprint;
    use image::imageops::FilterType;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct CountingCodec {
        inner: ImageCrateCodec,
        decodes: AtomicUsize,
    }

    impl CountingCodec {
        fn new() -> Self {
            Self {
                inner: ImageCrateCodec::with_filter(FilterType::Nearest),
                decodes: AtomicUsize::new(0),
            }
        }

        fn decodes(&self) -> usize {
            self.decodes.load(Ordering::SeqCst)
        }
    }

    impl ImageCodec for CountingCodec {
        fn decode(&self, bytes: &[u8]) -> AvatarResult<DecodedImage> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            self.inner.decode(bytes)
        }

        fn resize_to_fit(&self, image: &DecodedImage, max_edge: u32) -> DecodedImage {
            self.inner.resize_to_fit(image, max_edge)
        }

        fn encode(&self, image: &DecodedImage, format: AvatarFormat) -> AvatarResult<Vec<u8>> {
            self.inner.encode(image, format)
        }
    }

    struct Fixture {
        _temp: TempDir,
        storage: AvatarStorage,
        originals: OriginalStore,
        codec: Arc<CountingCodec>,
        cache: ThumbnailCache,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let storage = AvatarStorage::new(temp.path());
            storage.ensure_storage_dirs().await.unwrap();

            let originals = OriginalStore::new(
                storage.clone(),
                Arc::new(ImageCrateCodec::with_filter(FilterType::Nearest)),
            );
            let codec = Arc::new(CountingCodec::new());
            let cache = ThumbnailCache::new(storage.clone(), originals.clone(), codec.clone());

            Self {
                _temp: temp,
                storage,
                originals,
                codec,
                cache,
            }
        }

        async fn upload(&self, address: &str, width: u32, height: u32) -> Fingerprint {
            let fp = fingerprint::resolve(address).unwrap();
            self.originals
                .put(&fp, &png_bytes(width, height))
                .await
                .unwrap();
            set_age(&self.storage.original_path(&fp), 60);
            fp
        }

        fn write_default(&self) {
            let path = self.storage.default_avatar_path();
            std::fs::write(&path, png_bytes(512, 512)).unwrap();
            set_age(&path, 60);
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([90, 90, 90, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("Failed to write PNG to memory");
        bytes
    }

    fn set_age(path: &Path, seconds: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(seconds))
            .unwrap();
    }

    fn request(size: i64, format: AvatarFormat) -> ThumbnailRequest {
        ThumbnailRequest::new(size, format).unwrap()
    }

    fn dimensions(path: &Path) -> (u32, u32) {
        let img = image::open(path).unwrap();
        (img.width(), img.height())
    }

    #[tokio::test]
    async fn test_renders_once_then_serves_from_cache() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("cached@example.com", 200, 100).await;

        let first = fixture
            .cache
            .resolve(&fp, &request(80, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(first.regenerated);
        assert_eq!(first.key, AvatarKey::Fingerprint(fp.clone()));
        assert_eq!(dimensions(&first.path), (80, 40));

        let second = fixture
            .cache
            .resolve(&fp, &request(80, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(!second.regenerated);
        assert_eq!(second.path, first.path);
        assert_eq!(fixture.codec.decodes(), 1);
    }

    #[tokio::test]
    async fn test_seeded_natural_size_needs_no_decode() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("seeded@example.com", 64, 64).await;

        let thumbnail = fixture
            .cache
            .resolve(&fp, &request(64, AvatarFormat::Png))
            .await
            .unwrap();

        assert!(!thumbnail.regenerated);
        assert_eq!(fixture.codec.decodes(), 0);
    }

    #[tokio::test]
    async fn test_stale_thumbnail_is_regenerated() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("stale@example.com", 100, 100).await;

        let first = fixture
            .cache
            .resolve(&fp, &request(50, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(first.regenerated);

        // Thumbnail now predates the original
        set_age(&first.path, 120);

        let second = fixture
            .cache
            .resolve(&fp, &request(50, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(second.regenerated);
        assert_eq!(fixture.codec.decodes(), 2);

        let third = fixture
            .cache
            .resolve(&fp, &request(50, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(!third.regenerated);
        assert_eq!(fixture.codec.decodes(), 2);
    }

    #[tokio::test]
    async fn test_thumbnail_as_old_as_its_source_is_stale() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("same-tick@example.com", 100, 100).await;

        let original_modified = std::fs::metadata(fixture.storage.original_path(&fp))
            .unwrap()
            .modified()
            .unwrap();
        let seeded = fixture.storage.thumbnail_path(
            &AvatarKey::Fingerprint(fp.clone()),
            100,
            AvatarFormat::Png,
        );
        std::fs::File::options()
            .write(true)
            .open(&seeded)
            .unwrap()
            .set_modified(original_modified)
            .unwrap();
        let decodes_before = fixture.codec.decodes();

        let first = fixture
            .cache
            .resolve(&fp, &request(100, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(first.regenerated);
        assert_eq!(first.path, seeded);

        let second = fixture
            .cache
            .resolve(&fp, &request(100, AvatarFormat::Png))
            .await
            .unwrap();
        assert!(!second.regenerated);
        assert_eq!(fixture.codec.decodes(), decodes_before + 1);
    }

    #[tokio::test]
    async fn test_missing_original_falls_back_to_shared_default() {
        let fixture = Fixture::new().await;
        fixture.write_default();
        let first_fp = fingerprint::resolve("nobody@example.com").unwrap();
        let second_fp = fingerprint::resolve("someone-else@example.com").unwrap();

        let first = fixture
            .cache
            .resolve(&first_fp, &request(80, AvatarFormat::Png))
            .await
            .unwrap();
        assert_eq!(first.key, AvatarKey::Default);
        assert_eq!(
            first.path,
            fixture
                .storage
                .thumbnail_path(&AvatarKey::Default, 80, AvatarFormat::Png)
        );
        assert!(first.regenerated);
        assert_eq!(dimensions(&first.path), (80, 80));

        let second = fixture
            .cache
            .resolve(&second_fp, &request(80, AvatarFormat::Png))
            .await
            .unwrap();
        assert_eq!(second.path, first.path);
        assert!(!second.regenerated);
        assert_eq!(fixture.codec.decodes(), 1);
    }

    #[tokio::test]
    async fn test_missing_default_is_a_storage_error() {
        let fixture = Fixture::new().await;
        let fp = fingerprint::resolve("nobody@example.com").unwrap();

        let result = fixture
            .cache
            .resolve(&fp, &request(80, AvatarFormat::Png))
            .await;
        assert!(matches!(result, Err(AvatarError::StorageIo { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_requests_render_once() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("busy@example.com", 300, 300).await;

        let requests = (0..16).map(|_| {
            let cache = fixture.cache.clone();
            let fp = fp.clone();
            tokio::spawn(async move { cache.resolve(&fp, &request(120, AvatarFormat::Png)).await })
        });
        let results = futures::future::join_all(requests).await;

        let mut regenerated = 0;
        for result in results {
            let thumbnail = result.unwrap().unwrap();
            assert_eq!(dimensions(&thumbnail.path), (120, 120));
            if thumbnail.regenerated {
                regenerated += 1;
            }
        }

        assert_eq!(regenerated, 1);
        assert_eq!(fixture.codec.decodes(), 1);
        assert_eq!(fixture.cache.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_size_bounds_and_upscaling() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("bounds@example.com", 100, 50).await;

        let tiny = fixture
            .cache
            .resolve(&fp, &request(1, AvatarFormat::Png))
            .await
            .unwrap();
        assert_eq!(dimensions(&tiny.path).0, 1);

        let largest = fixture
            .cache
            .resolve(&fp, &request(512, AvatarFormat::Png))
            .await
            .unwrap();
        assert_eq!(dimensions(&largest.path), (512, 256));
    }

    #[tokio::test]
    async fn test_requested_format_is_used_for_the_thumbnail() {
        let fixture = Fixture::new().await;
        let fp = fixture.upload("formats@example.com", 64, 64).await;

        let thumbnail = fixture
            .cache
            .resolve(&fp, &request(32, AvatarFormat::Jpeg))
            .await
            .unwrap();

        assert!(thumbnail.path.to_string_lossy().ends_with(".jpeg"));
        let bytes = std::fs::read(&thumbnail.path).unwrap();
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
    }
}
