//! Feed ranking and pagination.
//!
//! [`rank`] is pure: it takes a snapshot of content with engagement counts and
//! orders it either by recency or by the engagement score within a time
//! window. The content types and visibility rules used by the post store live
//! here too.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ids::{PostId, UserId},
};

pub const DEFAULT_FEED_LIMIT: usize = 10;
const MAX_CONTENT_LEN: usize = 5000;
const MAX_COMMENT_LEN: usize = 1000;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedMode {
  #[default]
  Latest,
  Newest,
  Popular,
  PopularToday,
  PopularWeek,
  PopularMonth,
  PopularYear,
}

impl FeedMode {
  /// Earliest `created_at` admitted by this mode, or `None` for no window.
  /// `today` starts at midnight UTC.
  pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match self {
      Self::Latest | Self::Newest | Self::Popular => None,
      Self::PopularToday => Some(now.date_naive().and_time(NaiveTime::MIN).and_utc()),
      Self::PopularWeek => Some(now - Duration::days(7)),
      Self::PopularMonth => Some(now - Duration::days(30)),
      Self::PopularYear => Some(now - Duration::days(365)),
    }
  }

  pub fn by_score(self) -> bool { !matches!(self, Self::Latest | Self::Newest) }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Visibility {
  #[default]
  Public,
  Friends,
  Private,
}

/// Engagement counts, aggregated from likes, comments and shares at read
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Engagement {
  pub likes:    u64,
  pub comments: u64,
  pub shares:   u64,
}

impl Engagement {
  pub fn score(&self) -> u64 { self.likes + 2 * self.comments + 3 * self.shares }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
  pub id:         PostId,
  pub author_id:  UserId,
  pub content:    String,
  pub visibility: Visibility,
  pub created_at: DateTime<Utc>,
  pub engagement: Engagement,
}

/// Whether `viewer` may see `item`. `is_friend` is whether the viewer holds
/// an accepted relationship with the author.
pub fn can_view(item: &ContentItem, viewer: Option<UserId>, is_friend: bool) -> bool {
  let is_author = viewer == Some(item.author_id);
  match item.visibility {
    Visibility::Public => true,
    Visibility::Friends => is_author || is_friend,
    Visibility::Private => is_author,
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
  pub content:    String,
  #[serde(default)]
  pub visibility: Visibility,
}

impl NewPost {
  pub fn validated(mut self) -> Result<Self> {
    self.content = validate_text(&self.content, MAX_CONTENT_LEN, "post content")?;
    Ok(self)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id:         i64,
  pub post_id:    PostId,
  pub author_id:  UserId,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
  pub content: String,
}

impl NewComment {
  pub fn validated(mut self) -> Result<Self> {
    self.content = validate_text(&self.content, MAX_COMMENT_LEN, "comment")?;
    Ok(self)
  }
}

/// Selects the snapshot handed to [`rank`]. Only items visible to `viewer`
/// are included.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFilter {
  pub viewer: Option<UserId>,
  pub author: Option<UserId>,
  pub since:  Option<DateTime<Utc>>,
}

/// A slice of a ranked feed plus the number of items that passed the window
/// filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage<T> {
  pub items:  Vec<T>,
  pub total:  usize,
  pub limit:  usize,
  pub offset: usize,
}

impl<T> FeedPage<T> {
  pub fn map<U>(self, f: impl FnMut(T) -> U) -> FeedPage<U> {
    FeedPage {
      items:  self.items.into_iter().map(f).collect(),
      total:  self.total,
      limit:  self.limit,
      offset: self.offset,
    }
  }
}

/// Clamp raw pagination input: `limit < 1` becomes 10, `offset < 0` becomes 0.
pub fn clamp_window(limit: i64, offset: i64) -> (usize, usize) {
  let limit = if limit < 1 { DEFAULT_FEED_LIMIT } else { limit as usize };
  (limit, offset.max(0) as usize)
}

/// Filter, order and paginate `items`.
///
/// Recency modes sort by `created_at` descending; score modes sort by
/// [`Engagement::score`] descending. The sort is stable, so items that
/// compare equal keep their input order.
pub fn rank(
  mut items: Vec<ContentItem>,
  mode: FeedMode,
  limit: i64,
  offset: i64,
  now: DateTime<Utc>,
) -> FeedPage<ContentItem> {
  if let Some(start) = mode.window_start(now) {
    items.retain(|item| item.created_at >= start && item.created_at <= now);
  }
  if mode.by_score() {
    items.sort_by(|a, b| b.engagement.score().cmp(&a.engagement.score()));
  } else {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  }

  let (limit, offset) = clamp_window(limit, offset);
  let total = items.len();
  let items = items.into_iter().skip(offset).take(limit).collect();
  FeedPage { items, total, limit, offset }
}

fn validate_text(text: &str, max: usize, what: &str) -> Result<String> {
  let text = text.trim();
  if text.is_empty() || text.chars().count() > max {
    return Err(Error::InvalidInput(format!("{what} must be 1-{max} characters")));
  }
  Ok(text.to_owned())
}
