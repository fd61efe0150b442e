//! Content-addressed store for extracted cover images.
//!
//! Images live at `<output>/<covers_dir>/<key><ext>`, where the key is derived
//! from the source file's path. An entry is written once and reused afterwards.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use log::debug;
use tempfile::NamedTempFile;

use crate::{
    domain::{
        artwork::{ImageKind, RawArtwork},
        track::{AudioFileRef, CachedArtworkRef},
    },
    storage::error::StorageError,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub written: usize,
    pub reused: usize,
}

#[derive(Debug)]
pub struct ArtworkCache {
    output_dir: PathBuf,
    dir_name: String,
    written: AtomicUsize,
    reused: AtomicUsize,
}

impl ArtworkCache {
    /// Opens the cache under `output_dir`, creating the covers directory if needed.
    pub fn open(output_dir: &Path, dir_name: &str) -> Result<Self, StorageError> {
        let cache = Self {
            output_dir: output_dir.to_path_buf(),
            dir_name: dir_name.to_string(),
            written: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        };
        fs::create_dir_all(cache.dir())?;
        Ok(cache)
    }

    /// Absolute directory holding the images
    pub fn dir(&self) -> PathBuf {
        self.output_dir.join(&self.dir_name)
    }

    fn reference(&self, file_name: &str) -> CachedArtworkRef {
        CachedArtworkRef(format!("{}/{}", self.dir_name, file_name))
    }

    /// Returns the cached image of `file`, if one was persisted by an earlier run.
    pub fn has_cached(&self, file: &AudioFileRef) -> Option<CachedArtworkRef> {
        let key = file.cache_key();
        [ImageKind::Jpeg, ImageKind::Png]
            .iter()
            .map(|kind| format!("{key}{}", kind.extension()))
            .find(|name| self.dir().join(name).is_file())
            .map(|name| self.reference(&name))
    }

    /// Whether a reference handed out earlier still points at an image.
    pub fn contains(&self, cover: &CachedArtworkRef) -> bool {
        self.output_dir.join(cover.as_str()).is_file()
    }

    /// Persists `artwork` for `file` unless an image for the same key exists.
    ///
    /// Writes go through a temporary file that is renamed into place, so a
    /// reader never observes a partial image. Two writers racing on the same
    /// key write identical bytes; the last rename wins.
    pub fn resolve(
        &self,
        file: &AudioFileRef,
        artwork: RawArtwork,
    ) -> Result<CachedArtworkRef, StorageError> {
        let file_name = format!("{}{}", file.cache_key(), artwork.kind.extension());
        let dir = self.dir();
        let path = dir.join(&file_name);

        if path.is_file() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return Ok(self.reference(&file_name));
        }

        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&artwork.data)?;
        tmp.persist(&path).map_err(|e| StorageError::Fs(e.error))?;
        self.written.fetch_add(1, Ordering::Relaxed);

        debug!(
            "cached {} bytes of artwork for {} at {}",
            artwork.data.len(),
            file.relative,
            path.display()
        );
        Ok(self.reference(&file_name))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            written: self.written.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }
}
