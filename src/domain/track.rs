use std::path::{Path, PathBuf};

use serde::Serialize;

use super::hash::CacheKey;

/// Audio file found by the library scan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioFileRef {
    /// Absolute path, used for reading and for the cache key
    pub path: PathBuf,
    /// `/`-separated path relative to the scanned folder
    pub relative: String,
}

impl AudioFileRef {
    pub fn new(path: PathBuf, relative: impl Into<String>) -> Self {
        Self {
            path,
            relative: relative.into(),
        }
    }

    /// Builds a reference whose relative name is just the file name.
    pub fn from_path<P: AsRef<Path>>(p: P) -> Self {
        let path = p.as_ref().to_path_buf();
        let relative = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, relative }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from_path(&self.path)
    }
}

/// Path of a persisted cover image, relative to the output folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CachedArtworkRef(pub String);

impl CachedArtworkRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One entry of the generated playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistRecord {
    pub name: String,
    pub url: String,
    pub cover: Option<CachedArtworkRef>,
}
