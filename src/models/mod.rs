//! Value types shared by the avatar engine and the web layer

pub mod avatar;

pub use avatar::{
    AvatarFormat, AvatarKey, DEFAULT_AVATAR_KEY, Fingerprint, OriginalImage, ResolvedThumbnail,
    StoredOriginal, ThumbnailRequest,
};
