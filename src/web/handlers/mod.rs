//! HTTP request handlers

pub mod avatars;
pub mod health;
pub mod index;
