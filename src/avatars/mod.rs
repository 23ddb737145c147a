//! Avatar engine
//!
//! Fingerprint derivation, the original store, the thumbnail cache and the
//! recency log. Everything here works on the filesystem layout described in
//! [`storage`]; the HTTP layer only talks to [`AvatarService`].

pub mod codec;
pub mod fingerprint;
pub mod originals;
pub mod placeholder;
pub mod recent;
pub mod service;
pub mod storage;
pub mod thumbnails;

pub use codec::{DecodedImage, ImageCodec, ImageCrateCodec};
pub use originals::OriginalStore;
pub use recent::{RecencyLog, RecentAvatars};
pub use service::AvatarService;
pub use storage::AvatarStorage;
pub use thumbnails::ThumbnailCache;
