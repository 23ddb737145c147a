//! Email address normalization and fingerprint derivation

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{AvatarError, AvatarResult};
use crate::models::Fingerprint;

/// Length of a fingerprint in characters
pub const FINGERPRINT_LEN: usize = 32;

fn address_shape() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        Regex::new(r"\A\S+@\S+\.\S{2,}\z").expect("address pattern is a valid regex")
    })
}

/// Trim and lowercase an email address
pub fn normalize_address(raw_address: &str) -> String {
    raw_address.trim().to_lowercase()
}

/// Derive the fingerprint of an email address
///
/// The address is trimmed and lowercased before hashing, so
/// `" A@B.com "` and `"a@b.com"` resolve to the same fingerprint.
pub fn resolve(raw_address: &str) -> AvatarResult<Fingerprint> {
    let address = normalize_address(raw_address);
    if address.is_empty() || !address_shape().is_match(&address) {
        return Err(AvatarError::InvalidAddress {
            address: raw_address.to_string(),
        });
    }

    let digest = md5::compute(address.as_bytes());
    Ok(Fingerprint::from_trusted(format!("{:x}", digest)))
}

/// Accept an externally supplied identifier of fingerprint shape
///
/// Any 32 characters from `[a-zA-Z0-9_-]` are accepted, not only hex digests.
pub fn validate(value: &str) -> AvatarResult<Fingerprint> {
    let well_formed = value.len() == FINGERPRINT_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if !well_formed {
        return Err(AvatarError::InvalidFingerprint {
            value: value.to_string(),
        });
    }

    Ok(Fingerprint::from_trusted(value.to_ascii_lowercase()))
}

/// Whether a value is a lowercase hex digest, the shape legacy clients send
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
