//! SQL schema for the gym SQLite store.
//!
//! Executed on every connection open. `busy_timeout` is per-connection and
//! must come first so that concurrent openers wait on each other's schema
//! transaction instead of failing with `SQLITE_BUSY`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA busy_timeout = 5000;
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS members (
    member_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT    NOT NULL,
    email             TEXT    NOT NULL,
    phone             TEXT,
    identity_ref      TEXT    NOT NULL UNIQUE,    -- directory person id
    active            INTEGER NOT NULL DEFAULT 1,
    guest_invitations INTEGER NOT NULL DEFAULT 0 CHECK (guest_invitations >= 0),
    created_at        TEXT    NOT NULL            -- ISO 8601 UTC
);

CREATE TABLE IF NOT EXISTS rooms (
    room_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT    NOT NULL UNIQUE,
    max_occupancy INTEGER NOT NULL CHECK (max_occupancy >= 0),
    active        INTEGER NOT NULL DEFAULT 1
);

-- Subjects are ('member', <member_id>) or ('guest', <pass uuid>).
-- A guest's pass id is the session_id of its facility session.
CREATE TABLE IF NOT EXISTS facility_sessions (
    session_id    TEXT PRIMARY KEY,
    subject_kind  TEXT NOT NULL,
    subject_key   TEXT NOT NULL,
    escort_id     INTEGER REFERENCES members(member_id),
    opened_at     TEXT NOT NULL,
    closed_at     TEXT
);

CREATE TABLE IF NOT EXISTS room_sessions (
    session_id    TEXT PRIMARY KEY,
    subject_kind  TEXT    NOT NULL,
    subject_key   TEXT    NOT NULL,
    room_id       INTEGER NOT NULL REFERENCES rooms(room_id),
    opened_at     TEXT    NOT NULL,
    closed_at     TEXT
);

-- At most one open session per subject, and per (subject, room).
CREATE UNIQUE INDEX IF NOT EXISTS facility_open_idx
    ON facility_sessions(subject_kind, subject_key) WHERE closed_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS room_open_idx
    ON room_sessions(subject_kind, subject_key, room_id) WHERE closed_at IS NULL;
CREATE INDEX IF NOT EXISTS room_sessions_room_idx
    ON room_sessions(room_id) WHERE closed_at IS NULL;

PRAGMA user_version = 1;
";
