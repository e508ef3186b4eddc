//! [`ContentStore`] for [`SqliteStore`].

use plaza_core::{
  Error as CoreError, PostId, UserId,
  feed::{
    Comment, ContentFilter, ContentItem, Engagement, FeedPage, NewComment, NewPost, can_view,
  },
  page::{PageRequest, Paged},
  store::ContentStore,
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::{COMMENT_COLUMNS, POST_COLUMNS, RawComment, RawPost, encode_dt, now},
  relationships::are_friends,
  store::{SqliteStore, count, page_bounds, paged, query_all, require_user},
};

/// Live posts matching `:author` and `:since` that `:viewer` may see, for a
/// `posts p` alias.
const VISIBLE_POSTS: &str = "p.deleted_at IS NULL
  AND (:author IS NULL OR p.author_id = :author)
  AND (:since IS NULL OR p.created_at >= :since)
  AND (p.visibility = 'public'
    OR p.author_id = :viewer
    OR (p.visibility = 'friends' AND EXISTS (
         SELECT 1 FROM relationships r
         WHERE r.status = 'accepted'
           AND ((r.initiator_id = p.author_id AND r.recipient_id = :viewer)
             OR (r.recipient_id = p.author_id AND r.initiator_id = :viewer)))))";

/// Bind values for [`VISIBLE_POSTS`].
fn filter_binds(filter: ContentFilter) -> (Option<i64>, Option<i64>, Option<String>) {
  (filter.viewer.map(UserId::get), filter.author.map(UserId::get), filter.since.map(encode_dt))
}

fn find_live_post(conn: &Connection, id: PostId) -> Result<Option<ContentItem>> {
  let raw = conn
    .query_row(
      &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.post_id = ?1 AND p.deleted_at IS NULL"),
      [id.get()],
      RawPost::from_row,
    )
    .optional()?;
  raw.map(RawPost::into_item).transpose()
}

/// A live post `viewer` may see. Anything else is `PostNotFound`.
fn visible_post(conn: &Connection, viewer: Option<UserId>, id: PostId) -> Result<ContentItem> {
  let post = find_live_post(conn, id)?.ok_or(CoreError::PostNotFound(id))?;
  let is_friend = match viewer {
    Some(v) if v != post.author_id => are_friends(conn, v, post.author_id)?,
    _ => false,
  };
  if !can_view(&post, viewer, is_friend) {
    return Err(CoreError::PostNotFound(id).into());
  }
  Ok(post)
}

fn engagement(conn: &Connection, id: PostId) -> Result<Engagement> {
  let post = find_live_post(conn, id)?.ok_or(CoreError::PostNotFound(id))?;
  Ok(post.engagement)
}

impl ContentStore for SqliteStore {
  async fn create_post(&self, author: UserId, new: NewPost) -> Result<ContentItem> {
    let new = new.validated()?;
    let post = self
      .with_conn(move |conn| {
        require_user(conn, author)?;
        conn.execute(
          "INSERT INTO posts (author_id, content, visibility, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![author.get(), new.content, new.visibility.as_ref(), now()],
        )?;
        let id = PostId(conn.last_insert_rowid());
        find_live_post(conn, id)?.ok_or_else(|| CoreError::PostNotFound(id).into())
      })
      .await?;
    tracing::info!(post = %post.id, %author, "post created");
    Ok(post)
  }

  async fn get_post(&self, viewer: Option<UserId>, id: PostId) -> Result<ContentItem> {
    self.with_conn(move |conn| visible_post(conn, viewer, id)).await
  }

  async fn delete_post(&self, actor: UserId, id: PostId) -> Result<()> {
    self
      .with_conn(move |conn| {
        let post = find_live_post(conn, id)?.ok_or(CoreError::PostNotFound(id))?;
        if post.author_id != actor {
          return Err(CoreError::NotPostAuthor(id).into());
        }
        conn.execute(
          "UPDATE posts SET deleted_at = ?2 WHERE post_id = ?1",
          rusqlite::params![id.get(), now()],
        )?;
        Ok(())
      })
      .await?;
    tracing::info!(post = %id, %actor, "post deleted");
    Ok(())
  }

  async fn like(&self, user: UserId, id: PostId) -> Result<Engagement> {
    self
      .with_conn(move |conn| {
        visible_post(conn, Some(user), id)?;
        require_user(conn, user)?;
        conn.execute(
          "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id.get(), user.get(), now()],
        )?;
        engagement(conn, id)
      })
      .await
  }

  async fn unlike(&self, user: UserId, id: PostId) -> Result<Engagement> {
    self
      .with_conn(move |conn| {
        visible_post(conn, Some(user), id)?;
        conn.execute(
          "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
          [id.get(), user.get()],
        )?;
        engagement(conn, id)
      })
      .await
  }

  async fn add_comment(&self, user: UserId, id: PostId, new: NewComment) -> Result<Comment> {
    let new = new.validated()?;
    self
      .with_conn(move |conn| {
        visible_post(conn, Some(user), id)?;
        require_user(conn, user)?;
        conn.execute(
          "INSERT INTO comments (post_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id.get(), user.get(), new.content, now()],
        )?;
        conn
          .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1"),
            [conn.last_insert_rowid()],
            RawComment::from_row,
          )?
          .into_comment()
      })
      .await
  }

  async fn list_comments(
    &self,
    viewer: Option<UserId>,
    id: PostId,
    page: PageRequest,
  ) -> Result<Paged<Comment>> {
    let (limit, offset) = page_bounds(page);
    let (raws, total) = self
      .with_conn(move |conn| {
        visible_post(conn, viewer, id)?;
        let total = count(conn, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", [id.get()])?;
        let raws = query_all(
          conn,
          &format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1
             ORDER BY created_at ASC, comment_id ASC LIMIT ?2 OFFSET ?3"
          ),
          [id.get(), limit, offset],
          RawComment::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawComment::into_comment).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn share(&self, user: UserId, id: PostId) -> Result<Engagement> {
    self
      .with_conn(move |conn| {
        visible_post(conn, Some(user), id)?;
        require_user(conn, user)?;
        conn.execute(
          "INSERT INTO post_shares (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id.get(), user.get(), now()],
        )?;
        engagement(conn, id)
      })
      .await
  }

  async fn content_snapshot(&self, filter: ContentFilter) -> Result<Vec<ContentItem>> {
    let (viewer, author, since) = filter_binds(filter);
    let raws = self
      .with_conn(move |conn| {
        query_all(
          conn,
          &format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE {VISIBLE_POSTS}
             ORDER BY p.created_at DESC, p.post_id DESC"
          ),
          rusqlite::named_params! { ":author": author, ":since": since, ":viewer": viewer },
          RawPost::from_row,
        )
      })
      .await?;

    tracing::debug!(items = raws.len(), "content snapshot");
    raws.into_iter().map(RawPost::into_item).collect()
  }

  async fn recent_page(
    &self,
    filter: ContentFilter,
    limit: usize,
    offset: usize,
  ) -> Result<FeedPage<ContentItem>> {
    let (viewer, author, since) = filter_binds(filter);
    let (sql_limit, sql_offset) = (limit as i64, offset as i64);
    let (raws, total) = self
      .with_conn(move |conn| {
        let total = count(
          conn,
          &format!("SELECT COUNT(*) FROM posts p WHERE {VISIBLE_POSTS}"),
          rusqlite::named_params! { ":author": author, ":since": since, ":viewer": viewer },
        )?;
        let raws = query_all(
          conn,
          &format!(
            "SELECT {POST_COLUMNS} FROM posts p WHERE {VISIBLE_POSTS}
             ORDER BY p.created_at DESC, p.post_id DESC LIMIT :limit OFFSET :offset"
          ),
          rusqlite::named_params! {
            ":author": author,
            ":since": since,
            ":viewer": viewer,
            ":limit": sql_limit,
            ":offset": sql_offset,
          },
          RawPost::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawPost::into_item).collect::<Result<_>>()?;
    Ok(FeedPage { items, total: total as usize, limit, offset })
  }
}
