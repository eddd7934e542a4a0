//! SQL schema for the Souk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS locations (
    location_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ads (
    ad_id             TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL,
    location_id       TEXT NOT NULL REFERENCES locations(location_id),
    title             TEXT NOT NULL,
    description       TEXT NOT NULL,
    price_cents       INTEGER,          -- minor units; NULL = on request
    status            TEXT NOT NULL DEFAULT 'draft',
    created_at        TEXT NOT NULL,
    published_at      TEXT,
    stopped_at        TEXT,
    parent_ad_id      TEXT REFERENCES ads(ad_id),
    replaced_by_ad_id TEXT REFERENCES ads(ad_id),
    CHECK (status IN ('draft', 'active', 'stopped')),
    CHECK (price_cents IS NULL OR price_cents >= 0),
    CHECK (parent_ad_id IS NULL OR parent_ad_id != ad_id),
    CHECK (replaced_by_ad_id IS NULL OR replaced_by_ad_id != ad_id)
);

-- A source is forked at most once, and an ad replaces at most one source.
CREATE UNIQUE INDEX IF NOT EXISTS ads_parent_once
    ON ads(parent_ad_id) WHERE parent_ad_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS ads_replaced_by_once
    ON ads(replaced_by_ad_id) WHERE replaced_by_ad_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS ads_user_idx ON ads(user_id);

CREATE TRIGGER IF NOT EXISTS ads_replaced_by_write_once
BEFORE UPDATE OF replaced_by_ad_id ON ads
WHEN OLD.replaced_by_ad_id IS NOT NULL
 AND NEW.replaced_by_ad_id IS NOT OLD.replaced_by_ad_id
BEGIN
    SELECT RAISE(ABORT, 'replaced_by_ad_id is write-once');
END;

CREATE TRIGGER IF NOT EXISTS ads_draft_not_reentered
BEFORE UPDATE OF status ON ads
WHEN NEW.status = 'draft' AND OLD.status != 'draft'
BEGIN
    SELECT RAISE(ABORT, 'an ad never returns to draft');
END;

CREATE TABLE IF NOT EXISTS ad_photos (
    photo_id   TEXT PRIMARY KEY,
    ad_id      TEXT NOT NULL REFERENCES ads(ad_id),
    file_ref   TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (ad_id, sort_order)
);

-- Snapshots are strictly append-only.
CREATE TABLE IF NOT EXISTS ad_version_snapshots (
    snapshot_id   TEXT PRIMARY KEY,
    ad_id         TEXT NOT NULL REFERENCES ads(ad_id),
    status        TEXT NOT NULL,
    snapshot_json TEXT NOT NULL,
    action        TEXT NOT NULL,
    actor_user_id TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS snapshots_ad_idx ON ad_version_snapshots(ad_id);

CREATE TRIGGER IF NOT EXISTS snapshots_no_update
BEFORE UPDATE ON ad_version_snapshots
BEGIN
    SELECT RAISE(ABORT, 'ad_version_snapshots is append-only');
END;

CREATE TRIGGER IF NOT EXISTS snapshots_no_delete
BEFORE DELETE ON ad_version_snapshots
BEGIN
    SELECT RAISE(ABORT, 'ad_version_snapshots is append-only');
END;

PRAGMA user_version = 1;
";
