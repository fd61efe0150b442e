//! Runs sniffing, parsing and caching over a batch of audio files.
//!
//! Every file is handled on its own: whatever goes wrong with one file is
//! logged and turns into a missing cover for that file only.

use std::{
    fs::File,
    io::{self, BufReader},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    domain::track::{AudioFileRef, CachedArtworkRef, PlaylistRecord},
    metadata::{self, ContainerKind, ParseError},
    playlist,
    storage::{
        cache::ArtworkCache,
        error::StorageError,
        index::{ExtractionIndex, FileStamp},
    },
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported container format")]
    UnsupportedFormat,

    #[error("no embedded artwork")]
    NoArtworkPresent,

    #[error("corrupt structure: {0}")]
    CorruptStructure(String),

    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("artwork cache failure: {0}")]
    Storage(#[from] StorageError),
}

impl From<ParseError> for ExtractError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Corrupt(reason) => ExtractError::CorruptStructure(reason),
            ParseError::Io(e) => ExtractError::Io(e),
        }
    }
}

impl ExtractError {
    /// Whether the outcome will be the same on the next run of an unchanged file
    fn is_stable(&self) -> bool {
        matches!(
            self,
            ExtractError::UnsupportedFormat
                | ExtractError::NoArtworkPresent
                | ExtractError::CorruptStructure(_)
        )
    }
}

/// Stops a running batch before its next file
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub processed: usize,
    pub covers: usize,
    pub unsupported: usize,
    pub without_artwork: usize,
    pub failed: usize,
    /// Files answered by the freshness index without being parsed
    pub from_index: usize,
}

#[derive(Debug)]
pub struct Batch {
    pub records: Vec<PlaylistRecord>,
    pub stats: ExtractStats,
    /// Set when the batch stopped early; `records` then covers a prefix of the input
    pub cancelled: bool,
}

pub struct Extractor<'a> {
    cache: &'a ArtworkCache,
    index: Option<&'a ExtractionIndex>,
    cancel: CancelFlag,
}

impl<'a> Extractor<'a> {
    pub fn new(cache: &'a ArtworkCache) -> Self {
        Self {
            cache,
            index: None,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_index(mut self, index: &'a ExtractionIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Extracts covers for `files` in order and builds their playlist records.
    pub fn run(&self, files: &[AudioFileRef]) -> Batch {
        let mut stats = ExtractStats::default();
        let mut covers = Vec::with_capacity(files.len());
        let mut cancelled = false;

        for file in files {
            if self.cancel.is_cancelled() {
                info!(
                    "extraction cancelled after {} of {} files",
                    covers.len(),
                    files.len()
                );
                cancelled = true;
                break;
            }
            covers.push(self.cover_for(file, &mut stats));
        }

        let records = playlist::build_records(&files[..covers.len()], covers);
        Batch {
            records,
            stats,
            cancelled,
        }
    }

    fn cover_for(&self, file: &AudioFileRef, stats: &mut ExtractStats) -> Option<CachedArtworkRef> {
        stats.processed += 1;

        let stamp = self.index.and_then(|_| file_stamp(file));
        if let Some(cover) = self.fresh_cover(file, stamp.as_ref()) {
            stats.from_index += 1;
            match &cover {
                Some(_) => stats.covers += 1,
                None => stats.without_artwork += 1,
            }
            return cover;
        }

        let outcome = self.extract_one(file);
        let stable = match &outcome {
            Ok(_) => true,
            Err(e) => e.is_stable(),
        };

        let cover = match outcome {
            Ok(cover) => {
                stats.covers += 1;
                Some(cover)
            }
            Err(ExtractError::UnsupportedFormat) => {
                debug!("{}: unsupported format, no cover", file.relative);
                stats.unsupported += 1;
                None
            }
            Err(ExtractError::NoArtworkPresent) => {
                debug!("{}: no embedded artwork", file.relative);
                stats.without_artwork += 1;
                None
            }
            Err(e) => {
                warn!("Cover extract error ({}): {e}", file.relative);
                stats.failed += 1;
                None
            }
        };

        if let (Some(index), Some(stamp), true) = (self.index, stamp, stable) {
            if let Err(e) = index.record(&file.cache_key(), &stamp, cover.as_ref()) {
                warn!("failed to update index for {}: {e}", file.relative);
            }
        }

        cover
    }

    /// Outcome remembered by the index for an unchanged file.
    ///
    /// The outer `None` means the file has to be parsed.
    fn fresh_cover(
        &self,
        file: &AudioFileRef,
        stamp: Option<&FileStamp>,
    ) -> Option<Option<CachedArtworkRef>> {
        let (index, stamp) = (self.index?, stamp?);

        let entry = match index.lookup(&file.cache_key(), stamp) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!("index lookup failed for {}: {e}", file.relative);
                return None;
            }
        };

        match entry.cover {
            Some(cover) if !self.cache.contains(&cover) => {
                debug!("{}: cached image is gone, extracting again", file.relative);
                None
            }
            cover => Some(cover),
        }
    }

    /// Sniffs, parses and caches the cover of a single file.
    pub fn extract_one(&self, file: &AudioFileRef) -> Result<CachedArtworkRef, ExtractError> {
        let mut reader = BufReader::new(File::open(&file.path)?);

        let kind = ContainerKind::probe(&mut reader)?;
        if kind == ContainerKind::Unsupported {
            return Err(ExtractError::UnsupportedFormat);
        }

        let artwork = metadata::extract_artwork(kind, &mut reader)?
            .ok_or(ExtractError::NoArtworkPresent)?;

        Ok(self.cache.resolve(file, artwork)?)
    }
}

fn file_stamp(file: &AudioFileRef) -> Option<FileStamp> {
    match FileStamp::of(&file.path) {
        Ok(stamp) => Some(stamp),
        Err(e) => {
            debug!("no file stamp for {}: {e}", file.relative);
            None
        }
    }
}
