use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;
use strum::{AsRefStr, Display, EnumString};

use crate::config::defaults::{MAX_THUMBNAIL_SIZE, MIN_THUMBNAIL_SIZE};
use crate::errors::{AvatarError, AvatarResult};

/// Name used in place of a fingerprint for thumbnails of the default avatar
pub const DEFAULT_AVATAR_KEY: &str = "default";

/// 32 character identifier derived from a normalized email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a value already known to be a lowercase 32 character identifier
    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which source a thumbnail was rendered from, and so which file name it is cached under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AvatarKey {
    Fingerprint(Fingerprint),
    Default,
}

impl AvatarKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fingerprint(fingerprint) => fingerprint.as_str(),
            Self::Default => DEFAULT_AVATAR_KEY,
        }
    }
}

impl fmt::Display for AvatarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image formats the avatar store reads and writes
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AvatarFormat {
    #[default]
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    Gif,
}

impl AvatarFormat {
    /// File extension used for thumbnails in a size bucket
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }

    /// Parse a requested format, accepting the `jpg` alias
    pub fn parse(value: &str) -> AvatarResult<Self> {
        Self::from_str(value)
            .map_err(|_| AvatarError::unsupported(format!("unknown format '{value}'")))
    }

    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Gif => image::ImageFormat::Gif,
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }
}

/// Validated `{size, format}` pair for a thumbnail fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailRequest {
    size: u32,
    format: AvatarFormat,
}

impl ThumbnailRequest {
    /// Build a request, rejecting sizes outside 1..=512
    pub fn new(size: i64, format: AvatarFormat) -> AvatarResult<Self> {
        if size < MIN_THUMBNAIL_SIZE as i64 || size > MAX_THUMBNAIL_SIZE as i64 {
            return Err(AvatarError::InvalidSize { size });
        }
        Ok(Self {
            size: size as u32,
            format,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn format(&self) -> AvatarFormat {
        self.format
    }
}

/// Canonical image stored for a fingerprint
#[derive(Debug, Clone)]
pub struct OriginalImage {
    pub key: AvatarKey,
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOriginal {
    pub fingerprint: Fingerprint,
    pub format: AvatarFormat,
    pub width: u32,
    pub height: u32,
    /// Size bucket seeded with a copy of the original, `max(width, height)`
    pub size_class: u32,
}

/// Thumbnail file ready to be served
#[derive(Debug, Clone)]
pub struct ResolvedThumbnail {
    pub key: AvatarKey,
    pub path: PathBuf,
    pub size: u32,
    pub format: AvatarFormat,
    /// Whether this call rendered the file rather than reusing a cached one
    pub regenerated: bool,
}
