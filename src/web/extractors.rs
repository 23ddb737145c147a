//! Request parameter parsing for the avatar routes

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::avatars::fingerprint;
use crate::errors::{AvatarError, AvatarResult};
use crate::models::{AvatarFormat, Fingerprint};

/// `?s=` / `?size=` query parameters of an avatar fetch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SizeParams {
    pub s: Option<String>,
    pub size: Option<String>,
}

impl SizeParams {
    /// Requested edge length, `s` winning over `size`
    ///
    /// A value that is not an integer is reported as size 0 so it fails the
    /// same range check as an explicit 0.
    pub fn requested_size(&self, default_size: u32) -> AvatarResult<i64> {
        match self.s.as_deref().or(self.size.as_deref()) {
            None => Ok(i64::from(default_size)),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| AvatarError::InvalidSize { size: 0 }),
        }
    }
}

/// What the single segment after `/avatar/` names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarPath {
    Fingerprint {
        fingerprint: Fingerprint,
        format: AvatarFormat,
    },
    Email {
        address: String,
        /// Extension including the leading dot, kept for the redirect
        suffix: Option<String>,
    },
}

fn fingerprint_segment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_-]{32})(?:\.(png|jpg|jpeg|gif))?$")
            .expect("fingerprint segment pattern is a valid regex")
    })
}

fn email_segment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\S+?@\S+?\.\S{2,}?)(\.(?:png|jpg|jpeg|gif))?$")
            .expect("email segment pattern is a valid regex")
    })
}

/// Classify an `/avatar/` path segment, `None` when it is neither shape
pub fn parse_avatar_path(segment: &str) -> Option<AvatarPath> {
    if let Some(captures) = fingerprint_segment().captures(segment) {
        let fingerprint = fingerprint::validate(&captures[1]).ok()?;
        let format = match captures.get(2) {
            Some(extension) => AvatarFormat::parse(extension.as_str()).ok()?,
            None => AvatarFormat::default(),
        };
        return Some(AvatarPath::Fingerprint {
            fingerprint,
            format,
        });
    }

    email_segment().captures(segment).map(|captures| AvatarPath::Email {
        address: captures[1].to_string(),
        suffix: captures.get(2).map(|m| m.as_str().to_string()),
    })
}
