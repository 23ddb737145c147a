//! Configuration default values and fixed avatar limits

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_REQUEST_SIZE: &str = "10MB";

// Storage defaults
pub const DEFAULT_AVATAR_PATH: &str = "./avatars";

// Avatar defaults
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 80;
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DEFAULT_CACHE_MAX_AGE: &str = "1d";

// Avatar invariants (not configurable)
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024; // 1 MiB
pub const MAX_ORIGINAL_EDGE: u32 = 512;
pub const MIN_THUMBNAIL_SIZE: u32 = 1;
pub const MAX_THUMBNAIL_SIZE: u32 = 512;
