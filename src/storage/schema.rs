use rusqlite::Connection;

pub mod tables {
    pub const EXTRACTIONS: &str = "extractions";
    pub const RUNS: &str = "runs";

    pub const ALL_TABLES: &[&str] = &[EXTRACTIONS, RUNS];
}

pub mod columns {
    pub const CACHE_KEY: &str = "cache_key";
    pub const MODIFIED_AT: &str = "modified_at";
    pub const MODIFIED_NANOS: &str = "modified_nanos";
    pub const FILE_LEN: &str = "file_len";
    pub const COVER: &str = "cover";
    pub const FINISHED_AT: &str = "finished_at";
    pub const FILES: &str = "files";
    pub const COVERS: &str = "covers";
}

pub use columns::*;
pub use tables::*;

/// Bumped whenever `extractions` changes shape; older tables are dropped
/// and refilled on the next build.
pub const SCHEMA_VERSION: i32 = 2;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS extractions (
    cache_key TEXT PRIMARY KEY,
    modified_at INTEGER NOT NULL,
    modified_nanos INTEGER NOT NULL,
    file_len INTEGER NOT NULL,
    cover TEXT
);

CREATE TABLE IF NOT EXISTS runs (
    finished_at INTEGER NOT NULL,
    files INTEGER NOT NULL,
    covers INTEGER NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {EXTRACTIONS};"))?;
    }
    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
}
