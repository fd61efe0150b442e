//! Remembers extraction outcomes between runs.
//!
//! Each entry pairs a cache key with a stamp of the source file (modification
//! time to the nanosecond plus length) and the resolved cover, or NULL when the
//! file had no usable artwork. An entry is only trusted while the stamp matches.

use std::{path::Path, time::UNIX_EPOCH};

use anyhow::Context;
use rusqlite::{OptionalExtension, params};

use crate::{
    domain::{hash::CacheKey, track::CachedArtworkRef},
    storage::{
        db::{self, SecondsSinceUnix, system_time_to_i64},
        error::StorageError,
        schema::{columns::*, tables::*},
    },
};

/// What the index compares to decide a file is unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified_at: SecondsSinceUnix,
    pub modified_nanos: u32,
    pub len: u64,
}

impl FileStamp {
    pub fn of(path: &Path) -> anyhow::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let modified = meta.modified()?;
        let modified_nanos = modified
            .duration_since(UNIX_EPOCH)
            .with_context(|| "modification time before unix epoch")?
            .subsec_nanos();

        Ok(Self {
            modified_at: system_time_to_i64(modified)?,
            modified_nanos,
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub cover: Option<CachedArtworkRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub finished_at: SecondsSinceUnix,
    pub files: usize,
    pub covers: usize,
}

pub struct ExtractionIndex {
    pub(crate) db: rusqlite::Connection,
}

impl ExtractionIndex {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            db: db::open(Some(path))?,
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self { db: db::open(None)? })
    }

    /// Returns the stored outcome for `key` if it was recorded for the same
    /// file stamp.
    pub fn lookup(
        &self,
        key: &CacheKey,
        stamp: &FileStamp,
    ) -> Result<Option<IndexEntry>, StorageError> {
        let cover = self
            .db
            .query_row(
                &format!(
                    "SELECT {COVER} FROM {EXTRACTIONS}
                     WHERE {CACHE_KEY} = ?1 AND {MODIFIED_AT} = ?2
                       AND {MODIFIED_NANOS} = ?3 AND {FILE_LEN} = ?4"
                ),
                params![
                    key.to_hex(),
                    stamp.modified_at,
                    stamp.modified_nanos,
                    stamp.len as i64
                ],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;

        Ok(cover.map(|cover| IndexEntry {
            cover: cover.map(CachedArtworkRef),
        }))
    }

    pub fn record(
        &self,
        key: &CacheKey,
        stamp: &FileStamp,
        cover: Option<&CachedArtworkRef>,
    ) -> Result<(), StorageError> {
        self.db.execute(
            &format!(
                "INSERT INTO {EXTRACTIONS}
                    ({CACHE_KEY}, {MODIFIED_AT}, {MODIFIED_NANOS}, {FILE_LEN}, {COVER})
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT({CACHE_KEY}) DO UPDATE SET
                    {MODIFIED_AT} = excluded.{MODIFIED_AT},
                    {MODIFIED_NANOS} = excluded.{MODIFIED_NANOS},
                    {FILE_LEN} = excluded.{FILE_LEN},
                    {COVER} = excluded.{COVER}"
            ),
            params![
                key.to_hex(),
                stamp.modified_at,
                stamp.modified_nanos,
                stamp.len as i64,
                cover.map(|c| c.as_str())
            ],
        )?;
        Ok(())
    }

    pub fn record_run(&self, summary: &RunSummary) -> Result<(), StorageError> {
        self.db.execute(
            &format!("INSERT INTO {RUNS} ({FINISHED_AT}, {FILES}, {COVERS}) VALUES (?1, ?2, ?3)"),
            params![
                summary.finished_at,
                summary.files as i64,
                summary.covers as i64
            ],
        )?;
        Ok(())
    }

    pub fn last_run(&self) -> Result<Option<RunSummary>, StorageError> {
        let run = self
            .db
            .query_row(
                &format!(
                    "SELECT {FINISHED_AT}, {FILES}, {COVERS} FROM {RUNS} ORDER BY rowid DESC LIMIT 1"
                ),
                [],
                |row| {
                    Ok(RunSummary {
                        finished_at: row.get(0)?,
                        files: row.get::<_, i64>(1)? as usize,
                        covers: row.get::<_, i64>(2)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Number of remembered files, with and without artwork
    pub fn counts(&self) -> Result<(usize, usize), StorageError> {
        let (total, with_cover): (i64, i64) = self.db.query_row(
            &format!("SELECT COUNT(*), COUNT({COVER}) FROM {EXTRACTIONS}"),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((total as usize, with_cover as usize))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{ExtractionIndex, FileStamp, IndexEntry, RunSummary};
    use crate::{
        domain::{hash::CacheKey, track::CachedArtworkRef},
        storage::schema::{self, tables::EXTRACTIONS},
    };

    fn key(name: &str) -> CacheKey {
        CacheKey::from_path(&PathBuf::from(name))
    }

    fn stamp(modified_at: i64) -> FileStamp {
        FileStamp {
            modified_at,
            modified_nanos: 250,
            len: 4096,
        }
    }

    #[test]
    fn lookup_requires_same_mtime() -> anyhow::Result<()> {
        let index = ExtractionIndex::in_memory()?;
        let cover = CachedArtworkRef("covers/abc.jpg".to_string());
        index.record(&key("/m/a.mp3"), &stamp(100), Some(&cover))?;

        assert_eq!(
            index.lookup(&key("/m/a.mp3"), &stamp(100))?,
            Some(IndexEntry { cover: Some(cover) })
        );
        assert_eq!(index.lookup(&key("/m/a.mp3"), &stamp(101))?, None);
        assert_eq!(index.lookup(&key("/m/b.mp3"), &stamp(100))?, None);
        Ok(())
    }

    #[test]
    fn same_second_rewrite_is_stale() -> anyhow::Result<()> {
        let index = ExtractionIndex::in_memory()?;
        index.record(&key("/m/a.mp3"), &stamp(100), None)?;

        let resized = FileStamp {
            len: 8192,
            ..stamp(100)
        };
        let later_in_second = FileStamp {
            modified_nanos: 900,
            ..stamp(100)
        };
        assert_eq!(index.lookup(&key("/m/a.mp3"), &resized)?, None);
        assert_eq!(index.lookup(&key("/m/a.mp3"), &later_in_second)?, None);
        assert!(index.lookup(&key("/m/a.mp3"), &stamp(100))?.is_some());
        Ok(())
    }

    #[test]
    fn stamp_tracks_file_length() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("a.mp3");
        std::fs::write(&path, b"short")?;
        let before = FileStamp::of(&path)?;
        assert_eq!(before.len, 5);

        std::fs::write(&path, b"a longer body")?;
        assert_eq!(FileStamp::of(&path)?.len, 13);
        assert!(FileStamp::of(&tmp.path().join("gone.mp3")).is_err());
        Ok(())
    }

    #[test]
    fn outdated_extractions_table_is_replaced() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("index.sqlite");
        {
            let db = rusqlite::Connection::open(&path)?;
            db.execute_batch(&format!(
                "CREATE TABLE {EXTRACTIONS} (cache_key TEXT PRIMARY KEY, modified_at INTEGER NOT NULL, cover TEXT);
                 INSERT INTO {EXTRACTIONS} VALUES ('00', 1, NULL);"
            ))?;
        }

        let index = ExtractionIndex::open(&path)?;
        let version: i32 = index
            .db
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        assert_eq!(version, schema::SCHEMA_VERSION);
        assert_eq!(index.counts()?, (0, 0));

        index.record(&key("/m/a.mp3"), &stamp(1), None)?;
        assert_eq!(index.counts()?, (1, 0));
        Ok(())
    }

    #[test]
    fn absence_is_remembered() -> anyhow::Result<()> {
        let index = ExtractionIndex::in_memory()?;
        index.record(&key("/m/plain.wav"), &stamp(5), None)?;

        assert_eq!(
            index.lookup(&key("/m/plain.wav"), &stamp(5))?,
            Some(IndexEntry { cover: None })
        );
        Ok(())
    }

    #[test]
    fn record_overwrites_previous_outcome() -> anyhow::Result<()> {
        let index = ExtractionIndex::in_memory()?;
        index.record(&key("/m/a.mp3"), &stamp(1), None)?;
        let cover = CachedArtworkRef("covers/abc.png".to_string());
        index.record(&key("/m/a.mp3"), &stamp(2), Some(&cover))?;

        assert_eq!(index.lookup(&key("/m/a.mp3"), &stamp(1))?, None);
        assert_eq!(
            index.lookup(&key("/m/a.mp3"), &stamp(2))?,
            Some(IndexEntry { cover: Some(cover) })
        );
        assert_eq!(index.counts()?, (1, 1));
        Ok(())
    }

    #[test]
    fn last_run_is_most_recent() -> anyhow::Result<()> {
        let index = ExtractionIndex::in_memory()?;
        assert_eq!(index.last_run()?, None);

        let first = RunSummary {
            finished_at: 10,
            files: 3,
            covers: 1,
        };
        let second = RunSummary {
            finished_at: 20,
            files: 4,
            covers: 2,
        };
        index.record_run(&first)?;
        index.record_run(&second)?;

        assert_eq!(index.last_run()?, Some(second));
        Ok(())
    }

    #[test]
    fn entries_survive_reopen() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("index.sqlite");
        {
            let index = ExtractionIndex::open(&path)?;
            index.record(&key("/m/a.mp3"), &stamp(7), None)?;
        }

        let index = ExtractionIndex::open(&path)?;
        assert!(index.lookup(&key("/m/a.mp3"), &stamp(7))?.is_some());
        Ok(())
    }
}
