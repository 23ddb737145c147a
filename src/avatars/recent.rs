//! Append-only log of uploaded fingerprints

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::avatars::fingerprint;
use crate::errors::{AvatarError, AvatarResult};
use crate::models::Fingerprint;

/// Shared recency log. Appends are serialized; reads take a snapshot of the file.
#[derive(Debug, Clone)]
pub struct RecencyLog {
    path: PathBuf,
    append_lock: Arc<Mutex<()>>,
}

impl RecencyLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one fingerprint and flush it before returning
    pub async fn record(&self, fingerprint: &Fingerprint) -> AvatarResult<()> {
        let _guard = self.append_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AvatarError::storage(&self.path, e))?;

        file.write_all(format!("{fingerprint}\n").as_bytes())
            .await
            .map_err(|e| AvatarError::storage(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| AvatarError::storage(&self.path, e))?;

        debug!("Recorded upload of {} in {}", fingerprint, self.path.display());
        Ok(())
    }

    /// Up to `limit` distinct fingerprints, most recently uploaded first
    ///
    /// The log is read backwards in fixed-size chunks and reading stops once
    /// `limit` distinct entries were found, so the cost follows the tail that
    /// has to be scanned rather than the full log. A missing log yields nothing.
    pub async fn recent(&self, limit: usize) -> AvatarResult<RecentAvatars> {
        let path = self.path.clone();
        let entries = tokio::task::spawn_blocking(move || {
            scan_newest_first(&path, limit).map_err(|e| AvatarError::storage(&path, e))
        })
        .await??;

        Ok(RecentAvatars {
            entries: entries.into_iter(),
        })
    }
}

const READ_CHUNK: u64 = 8 * 1024;

fn scan_newest_first(path: &Path, limit: usize) -> io::Result<Vec<Fingerprint>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut position = file.metadata()?.len();
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    // Start of a line whose beginning lies in an earlier chunk
    let mut partial: Vec<u8> = Vec::new();

    while position > 0 && found.len() < limit {
        let len = READ_CHUNK.min(position);
        position -= len;

        let mut chunk = vec![0u8; len as usize];
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&partial);

        let split = if position == 0 {
            0
        } else {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => newline + 1,
                None => chunk.len(),
            }
        };

        for line in chunk[split..].split(|&b| b == b'\n').rev() {
            if found.len() == limit {
                break;
            }
            accept_line(line, &mut seen, &mut found);
        }

        partial = chunk[..split].to_vec();
        if partial.last() == Some(&b'\n') {
            partial.pop();
        }
    }

    Ok(found)
}

fn accept_line(line: &[u8], seen: &mut HashSet<Fingerprint>, found: &mut Vec<Fingerprint>) {
    let entry = String::from_utf8_lossy(line);
    let entry = entry.trim();
    if entry.is_empty() {
        return;
    }

    match fingerprint::validate(entry) {
        Ok(fingerprint) => {
            if seen.insert(fingerprint.clone()) {
                found.push(fingerprint);
            }
        }
        Err(_) => warn!("Skipping malformed recency log entry: {:?}", entry),
    }
}

/// Deduplicated fingerprints from the recency log, newest first
#[derive(Debug)]
pub struct RecentAvatars {
    entries: std::vec::IntoIter<Fingerprint>,
}

impl Iterator for RecentAvatars {
    type Item = Fingerprint;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
