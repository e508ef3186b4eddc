//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so lexical order equals chronological order.
//! Enums are stored as their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use plaza_core::{
  GroupId, PostId, UserId,
  feed::{Comment, ContentItem, Engagement},
  group::{GroupEntity, MembershipEdge},
  identity::UserIdentity,
  relationship::RelationshipEdge,
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn now() -> String { encode_dt(Utc::now()) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "user_id, username, display_name, avatar_url, is_active, created_at";

pub const EDGE_COLUMNS: &str =
  "relationship_id, initiator_id, recipient_id, status, created_at, updated_at";

/// Group columns for a `user_groups g` alias.
pub const GROUP_COLUMNS: &str = "g.group_id, g.name, g.description, g.privacy, g.cover_image, \
                                 g.avatar, g.created_by, g.member_count, g.created_at, g.updated_at";

pub const MEMBER_COLUMNS: &str =
  "member_id, group_id, user_id, role, nickname, is_muted, status, joined_at, left_at";

pub const COMMENT_COLUMNS: &str = "comment_id, post_id, author_id, content, created_at";

/// Post columns plus aggregated engagement, for a `posts p` alias.
pub const POST_COLUMNS: &str = "p.post_id, p.author_id, p.content, p.visibility, p.created_at,
  (SELECT COUNT(*) FROM post_likes  l WHERE l.post_id = p.post_id),
  (SELECT COUNT(*) FROM comments    c WHERE c.post_id = p.post_id),
  (SELECT COUNT(*) FROM post_shares s WHERE s.post_id = p.post_id)";

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `users` row before timestamp parsing.
pub struct RawUser {
  pub user_id:      i64,
  pub username:     String,
  pub display_name: String,
  pub avatar_url:   Option<String>,
  pub is_active:    bool,
  pub created_at:   String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      username:     row.get(1)?,
      display_name: row.get(2)?,
      avatar_url:   row.get(3)?,
      is_active:    row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<UserIdentity> {
    Ok(UserIdentity {
      id:           UserId(self.user_id),
      username:     self.username,
      display_name: self.display_name,
      avatar_url:   self.avatar_url,
      is_active:    self.is_active,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawEdge {
  pub relationship_id: i64,
  pub initiator_id:    i64,
  pub recipient_id:    i64,
  pub status:          String,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawEdge {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relationship_id: row.get(0)?,
      initiator_id:    row.get(1)?,
      recipient_id:    row.get(2)?,
      status:          row.get(3)?,
      created_at:      row.get(4)?,
      updated_at:      row.get(5)?,
    })
  }

  pub fn into_edge(self) -> Result<RelationshipEdge> {
    Ok(RelationshipEdge {
      id:           self.relationship_id,
      initiator_id: UserId(self.initiator_id),
      recipient_id: UserId(self.recipient_id),
      status:       decode_enum("relationship status", &self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawGroup {
  pub group_id:     i64,
  pub name:         String,
  pub description:  String,
  pub privacy:      String,
  pub cover_image:  Option<String>,
  pub avatar:       Option<String>,
  pub created_by:   i64,
  pub member_count: i64,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawGroup {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:     row.get(0)?,
      name:         row.get(1)?,
      description:  row.get(2)?,
      privacy:      row.get(3)?,
      cover_image:  row.get(4)?,
      avatar:       row.get(5)?,
      created_by:   row.get(6)?,
      member_count: row.get(7)?,
      created_at:   row.get(8)?,
      updated_at:   row.get(9)?,
    })
  }

  pub fn into_group(self) -> Result<GroupEntity> {
    Ok(GroupEntity {
      id:           GroupId(self.group_id),
      name:         self.name,
      description:  self.description,
      privacy:      decode_enum("group privacy", &self.privacy)?,
      cover_image:  self.cover_image,
      avatar:       self.avatar,
      created_by:   UserId(self.created_by),
      member_count: self.member_count,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawMember {
  pub member_id: i64,
  pub group_id:  i64,
  pub user_id:   i64,
  pub role:      String,
  pub nickname:  Option<String>,
  pub is_muted:  bool,
  pub status:    String,
  pub joined_at: String,
  pub left_at:   Option<String>,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id: row.get(0)?,
      group_id:  row.get(1)?,
      user_id:   row.get(2)?,
      role:      row.get(3)?,
      nickname:  row.get(4)?,
      is_muted:  row.get(5)?,
      status:    row.get(6)?,
      joined_at: row.get(7)?,
      left_at:   row.get(8)?,
    })
  }

  pub fn into_member(self) -> Result<MembershipEdge> {
    Ok(MembershipEdge {
      id:        self.member_id,
      group_id:  GroupId(self.group_id),
      user_id:   UserId(self.user_id),
      role:      decode_enum("member role", &self.role)?,
      nickname:  self.nickname,
      is_muted:  self.is_muted,
      status:    decode_enum("membership status", &self.status)?,
      joined_at: decode_dt(&self.joined_at)?,
      left_at:   self.left_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawPost {
  pub post_id:    i64,
  pub author_id:  i64,
  pub content:    String,
  pub visibility: String,
  pub created_at: String,
  pub likes:      i64,
  pub comments:   i64,
  pub shares:     i64,
}

impl RawPost {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:    row.get(0)?,
      author_id:  row.get(1)?,
      content:    row.get(2)?,
      visibility: row.get(3)?,
      created_at: row.get(4)?,
      likes:      row.get(5)?,
      comments:   row.get(6)?,
      shares:     row.get(7)?,
    })
  }

  pub fn into_item(self) -> Result<ContentItem> {
    Ok(ContentItem {
      id:         PostId(self.post_id),
      author_id:  UserId(self.author_id),
      content:    self.content,
      visibility: decode_enum("post visibility", &self.visibility)?,
      created_at: decode_dt(&self.created_at)?,
      engagement: Engagement {
        likes:    self.likes as u64,
        comments: self.comments as u64,
        shares:   self.shares as u64,
      },
    })
  }
}

pub struct RawComment {
  pub comment_id: i64,
  pub post_id:    i64,
  pub author_id:  i64,
  pub content:    String,
  pub created_at: String,
}

impl RawComment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      post_id:    row.get(1)?,
      author_id:  row.get(2)?,
      content:    row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:         self.comment_id,
      post_id:    PostId(self.post_id),
      author_id:  UserId(self.author_id),
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
