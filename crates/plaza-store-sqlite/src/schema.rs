//! SQL schema for the Plaza SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      INTEGER PRIMARY KEY,
    username     TEXT NOT NULL UNIQUE,   -- stored lowercase
    display_name TEXT NOT NULL,
    avatar_url   TEXT,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

-- One row per unordered pair; direction is carried by initiator/recipient.
CREATE TABLE IF NOT EXISTS relationships (
    relationship_id INTEGER PRIMARY KEY,
    initiator_id    INTEGER NOT NULL REFERENCES users(user_id),
    recipient_id    INTEGER NOT NULL REFERENCES users(user_id),
    status          TEXT NOT NULL,   -- 'pending' | 'accepted' | 'rejected' | 'blocked'
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    CHECK (initiator_id != recipient_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS relationships_pair_idx
    ON relationships (min(initiator_id, recipient_id), max(initiator_id, recipient_id));
CREATE INDEX IF NOT EXISTS relationships_recipient_idx ON relationships(recipient_id, status);

-- member_count always equals the number of approved rows in group_members.
CREATE TABLE IF NOT EXISTS user_groups (
    group_id     INTEGER PRIMARY KEY,
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    privacy      TEXT NOT NULL,   -- 'public' | 'private'
    cover_image  TEXT,
    avatar       TEXT,
    created_by   INTEGER NOT NULL REFERENCES users(user_id),
    member_count INTEGER NOT NULL DEFAULT 0 CHECK (member_count >= 0),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_members (
    member_id INTEGER PRIMARY KEY,
    group_id  INTEGER NOT NULL REFERENCES user_groups(group_id) ON DELETE CASCADE,
    user_id   INTEGER NOT NULL REFERENCES users(user_id),
    role      TEXT NOT NULL,   -- 'member' | 'admin'
    nickname  TEXT,
    is_muted  INTEGER NOT NULL DEFAULT 0,
    status    TEXT NOT NULL,   -- 'pending' | 'approved' | 'rejected'
    joined_at TEXT NOT NULL,
    left_at   TEXT,
    UNIQUE (group_id, user_id)
);

CREATE INDEX IF NOT EXISTS group_members_user_idx ON group_members(user_id, status);

CREATE TABLE IF NOT EXISTS posts (
    post_id    INTEGER PRIMARY KEY,
    author_id  INTEGER NOT NULL REFERENCES users(user_id),
    content    TEXT NOT NULL,
    visibility TEXT NOT NULL,   -- 'public' | 'friends' | 'private'
    created_at TEXT NOT NULL,
    deleted_at TEXT             -- soft delete
);

CREATE INDEX IF NOT EXISTS posts_created_idx ON posts(created_at);
CREATE INDEX IF NOT EXISTS posts_author_idx  ON posts(author_id);

CREATE TABLE IF NOT EXISTS post_likes (
    post_id    INTEGER NOT NULL REFERENCES posts(post_id),
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (post_id, user_id)
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY,
    post_id    INTEGER NOT NULL REFERENCES posts(post_id),
    author_id  INTEGER NOT NULL REFERENCES users(user_id),
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS comments_post_idx ON comments(post_id);

CREATE TABLE IF NOT EXISTS post_shares (
    share_id   INTEGER PRIMARY KEY,
    post_id    INTEGER NOT NULL REFERENCES posts(post_id),
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS post_shares_post_idx ON post_shares(post_id);

PRAGMA user_version = 1;
";
