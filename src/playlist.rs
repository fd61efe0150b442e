//! Playlist records and the files that expose them to the browser player

use std::path::{Path, PathBuf};

use crate::{
    domain::track::{AudioFileRef, CachedArtworkRef, PlaylistRecord},
    storage::error::StorageError,
};

/// Global the player page reads the playlist from
pub const MANIFEST_VARIABLE: &str = "LOCAL_FILES";

const PLAYER_TEMPLATE: &str = include_str!("../html/player.html");

/// Pairs each file with its cover, keeping the order of `files`.
pub fn build_records(
    files: &[AudioFileRef],
    covers: Vec<Option<CachedArtworkRef>>,
) -> Vec<PlaylistRecord> {
    files
        .iter()
        .zip(covers)
        .map(|(file, cover)| PlaylistRecord {
            name: file.relative.clone(),
            // the player encodes the URL itself
            url: file.relative.clone(),
            cover,
        })
        .collect()
}

pub fn render_manifest(records: &[PlaylistRecord]) -> Result<String, serde_json::Error> {
    Ok(format!(
        "const {MANIFEST_VARIABLE} = {};",
        serde_json::to_string_pretty(records)?
    ))
}

pub fn write_manifest(
    dir: &Path,
    file_name: &str,
    records: &[PlaylistRecord],
) -> Result<PathBuf, StorageError> {
    let path = dir.join(file_name);
    std::fs::write(&path, render_manifest(records)?)?;
    Ok(path)
}

/// Writes the bundled player page, pointed at the manifest `manifest_name`.
pub fn write_player_page(
    dir: &Path,
    file_name: &str,
    manifest_name: &str,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(file_name);
    let page = PLAYER_TEMPLATE
        .replace("{{MANIFEST}}", manifest_name)
        .replace("{{MANIFEST_VARIABLE}}", MANIFEST_VARIABLE);
    std::fs::write(&path, page)?;
    Ok(path)
}
