//! SQLite schema for the vector index.

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

/// Tables: one row per chunk plus a key/value table for index metadata.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id   TEXT PRIMARY KEY NOT NULL,
    position   INTEGER NOT NULL,
    text       TEXT NOT NULL,
    metadata   TEXT NOT NULL,
    embedding  BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS index_meta (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";
