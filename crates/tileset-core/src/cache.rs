//! Incremental rebuild cache.
//!
//! One `.tileset-cache` file per output directory holds a flat JSON object
//! mapping a normalized atlas key (`"/name"`) to the fingerprint of the build
//! that produced the artifacts next to it. The cache is only an optimization:
//! every failure here degrades to a miss or a skipped write.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::catalog::FrameContent;
use crate::error::TilesetError;

pub const CACHE_FILENAME: &str = ".tileset-cache";

/// Outcome of [`CacheStore::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn is_hit(self) -> bool {
        self == CacheStatus::Hit
    }
}

/// Handle over the cache file of one directory.
///
/// The file is read on first access and kept in memory for the lifetime of
/// the handle; every commit rewrites it whole.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    entries: Option<BTreeMap<String, String>>,
}

impl CacheStore {
    /// Opens the store for `dir`. Nothing is read until first use.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILENAME)
    }

    /// Loaded entries, keyed by normalized atlas key.
    pub fn entries(&mut self) -> &BTreeMap<String, String> {
        self.load()
    }

    /// Returns `Hit` when the artifacts for `key` exist and the stored
    /// fingerprint matches one freshly computed from `config` and `frames`.
    pub fn check<C, F>(&mut self, key: &str, config: &C, frames: &[F]) -> CacheStatus
    where
        C: Serialize,
        F: FrameContent,
    {
        let (image, descriptor) = artifact_paths(&self.dir, key);
        if !image.is_file() || !descriptor.is_file() {
            debug!(key, "cache miss: artifacts missing");
            return CacheStatus::Miss;
        }
        let normalized = normalize_key(key);
        let Some(stored) = self.load().get(&normalized).cloned() else {
            debug!(key, "cache miss: no entry");
            return CacheStatus::Miss;
        };
        match fingerprint(config, frames) {
            Ok(current) if current == stored => CacheStatus::Hit,
            Ok(_) => {
                debug!(key, "cache miss: fingerprint changed");
                CacheStatus::Miss
            }
            Err(e) => {
                debug!(key, error = %e, "cache miss: fingerprint unavailable");
                CacheStatus::Miss
            }
        }
    }

    /// Records the fingerprint of a successful build under `key`.
    /// Failures are logged and otherwise ignored.
    pub fn commit<C, F>(&mut self, key: &str, config: &C, frames: &[F])
    where
        C: Serialize,
        F: FrameContent,
    {
        let value = match fingerprint(config, frames) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "cache entry not recorded");
                return;
            }
        };
        let normalized = normalize_key(key);
        self.load();
        let entries = self.entries.get_or_insert_with(BTreeMap::new);
        entries.insert(normalized, value);
        if let Err(e) = self.persist() {
            warn!(path = %self.file_path().display(), error = %e, "failed to write cache file");
        }
    }

    fn load(&mut self) -> &BTreeMap<String, String> {
        let path = self.file_path();
        self.entries.get_or_insert_with(|| match read_entries(&path) {
            Ok(map) => map,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "starting with an empty cache");
                BTreeMap::new()
            }
        })
    }

    fn persist(&self) -> crate::Result<()> {
        let empty = BTreeMap::new();
        let entries = self.entries.as_ref().unwrap_or(&empty);
        fs::create_dir_all(&self.dir)?;
        fs::write(self.file_path(), serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> crate::Result<BTreeMap<String, String>> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&text).map_err(|e| TilesetError::CacheCorruption(e.to_string()))
}

/// `"/name"` with forward slashes, whatever separators `key` uses.
pub fn normalize_key(key: &str) -> String {
    let key = key.replace('\\', "/");
    format!("/{}", key.trim_matches('/'))
}

/// Atlas image and descriptor paths for `key` inside `dir`.
pub fn artifact_paths(dir: &Path, key: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{key}.png")),
        dir.join(format!("{key}.json")),
    )
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hash_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// `hash(config) | name:hash,name:hash,...` in frame order.
///
/// Frame contents are read from disk on every call. The result depends on
/// frame order, so reordering identical frames changes it.
pub fn fingerprint<C, F>(config: &C, frames: &[F]) -> std::io::Result<String>
where
    C: Serialize,
    F: FrameContent,
{
    let config_json = serde_json::to_vec(config)?;
    let mut parts = Vec::with_capacity(frames.len());
    for f in frames {
        let content = fs::read(f.content_path())?;
        parts.push(format!("{}:{}", f.name(), hash_digest(&content)));
    }
    Ok(format!("{}|{}", hash_digest(&config_json), parts.join(",")))
}
