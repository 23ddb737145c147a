//! avatard: a self-hosted avatar service
//!
//! Users upload one image per email address. Clients fetch square thumbnails
//! by the MD5 fingerprint of the address at any size up to 512px; addresses
//! without an upload get a default avatar.

pub mod assets;
pub mod avatars;
pub mod config;
pub mod errors;
pub mod models;
pub mod web;
