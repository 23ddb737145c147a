//! Image codec adapter
//!
//! The avatar engine never touches pixels itself. Decoding, bounding-box
//! resizing and encoding go through [`ImageCodec`] so the engine only decides
//! when those steps run and where their output lands.

use image::{DynamicImage, imageops::FilterType};
use std::fmt::Debug;
use std::io::Cursor;

use crate::errors::{AvatarError, AvatarResult};
use crate::models::AvatarFormat;

/// A decoded image together with the format it was stored in
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: AvatarFormat,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn longest_edge(&self) -> u32 {
        self.width().max(self.height())
    }
}

/// Decode, resize-to-fit and encode capability
pub trait ImageCodec: Send + Sync + Debug {
    /// Decode bytes in one of the supported formats
    fn decode(&self, bytes: &[u8]) -> AvatarResult<DecodedImage>;

    /// Scale so the longest edge equals `max_edge`, preserving aspect ratio.
    /// Scales up as well as down.
    fn resize_to_fit(&self, image: &DecodedImage, max_edge: u32) -> DecodedImage;

    /// Encode to the given format
    fn encode(&self, image: &DecodedImage, format: AvatarFormat) -> AvatarResult<Vec<u8>>;
}

/// [`ImageCodec`] backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateCodec {
    filter: FilterType,
}

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, bytes: &[u8]) -> AvatarResult<DecodedImage> {
        let detected = image::guess_format(bytes)
            .map_err(|e| AvatarError::unsupported(format!("unrecognized image data: {e}")))?;

        let format = AvatarFormat::from_image_format(detected)
            .ok_or_else(|| AvatarError::unsupported(format!("{detected:?} is not accepted")))?;

        let image = image::load_from_memory_with_format(bytes, detected)
            .map_err(|e| AvatarError::unsupported(format!("failed to decode {format}: {e}")))?;

        Ok(DecodedImage { image, format })
    }

    fn resize_to_fit(&self, image: &DecodedImage, max_edge: u32) -> DecodedImage {
        if image.longest_edge() == max_edge {
            return image.clone();
        }

        DecodedImage {
            image: image.image.resize(max_edge, max_edge, self.filter),
            format: image.format,
        }
    }

    fn encode(&self, image: &DecodedImage, format: AvatarFormat) -> AvatarResult<Vec<u8>> {
        // JPEG has no alpha channel; GIF frames are encoded from RGBA
        let prepared = match format {
            AvatarFormat::Jpeg => DynamicImage::ImageRgb8(image.image.to_rgb8()),
            AvatarFormat::Gif => DynamicImage::ImageRgba8(image.image.to_rgba8()),
            AvatarFormat::Png => image.image.clone(),
        };

        let mut bytes = Vec::new();
        prepared
            .write_to(&mut Cursor::new(&mut bytes), format.to_image_format())
            .map_err(|e| AvatarError::Encode {
                format: format.to_string(),
                message: e.to_string(),
            })?;

        Ok(bytes)
    }
}
