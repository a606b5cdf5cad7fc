//! SQL schema for the annostore metadata database.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
    project_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

-- One row per layer; the full definition is stored as JSON.
CREATE TABLE IF NOT EXISTS layers (
    layer_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id  INTEGER NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    definition  TEXT NOT NULL,
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS source_documents (
    document_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id        INTEGER NOT NULL REFERENCES projects(project_id) ON DELETE CASCADE,
    name              TEXT NOT NULL,
    format            TEXT NOT NULL,
    state             TEXT NOT NULL DEFAULT 'new',
    timestamp         TEXT,             -- RFC 3339 UTC of the last curation save
    sentence_accessed INTEGER NOT NULL DEFAULT 0,
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS annotation_documents (
    document_id       INTEGER NOT NULL REFERENCES source_documents(document_id) ON DELETE CASCADE,
    user              TEXT NOT NULL,
    state             TEXT NOT NULL DEFAULT 'new',
    timestamp         TEXT,             -- RFC 3339 UTC of the user's last save
    sentence_accessed INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (document_id, user)
);

CREATE INDEX IF NOT EXISTS source_documents_project_idx ON source_documents(project_id);

PRAGMA user_version = 1;
";
