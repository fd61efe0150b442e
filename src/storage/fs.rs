//! Module to scan the music folder in the file system

use log::warn;
use walkdir::{DirEntry, WalkDir};

use std::path::Path;

use crate::{config::LibraryConfig, domain::track::AudioFileRef, storage::error::StorageError};

pub fn is_music_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// `/`-separated path of `path` relative to `root`
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lists the audio files of the music folder, sorted by relative path.
///
/// Hidden files and directories are skipped. Only the top level is read
/// unless the library is configured as recursive.
pub fn scan_library(
    root: &Path,
    config: &LibraryConfig,
) -> Result<Vec<AudioFileRef>, StorageError> {
    let root = std::fs::canonicalize(root)?;
    let root_str = root.to_string_lossy();
    let max_depth = if config.recursive { usize::MAX } else { 1 };

    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true);

    let mut files = walker
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("error while scanning dir {root_str}, skipping an entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_music_file(e.path(), &config.extensions))
        .map(|e| {
            let relative = relative_name(&root, e.path());
            AudioFileRef::new(e.into_path(), relative)
        })
        .collect::<Vec<_>>();

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
