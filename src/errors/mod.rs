//! Centralized error handling for the avatar service
//!
//! Two layers of errors are defined here:
//!
//! - **Avatar Errors**: everything the avatar engine can report while resolving
//!   fingerprints, storing originals and materializing thumbnails
//! - **Application Errors**: startup and configuration failures surfaced by `main`
//!
//! # Usage
//!
//! ```rust
//! use avatard::errors::{AvatarError, AvatarResult};
//!
//! fn check_size(size: u32) -> AvatarResult<u32> {
//!     if size == 0 {
//!         return Err(AvatarError::InvalidSize { size: size as i64 });
//!     }
//!     Ok(size)
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for avatar engine Results
pub type AvatarResult<T> = Result<T, AvatarError>;
