//! [`SqliteStore`] and its [`IdentityStore`] implementation.
//!
//! The ledger implementations live in sibling modules; the synchronous
//! helpers here are shared by all of them and run on the connection thread.

use std::path::Path;

use plaza_core::{
  Error as CoreError, UserId,
  identity::{NewUser, ProfilePatch, UserIdentity},
  page::{PageRequest, Paged},
  store::IdentityStore,
};
use rusqlite::{Connection, OptionalExtension as _, Params, Row};

use crate::{
  Result,
  encode::{RawUser, USER_COLUMNS, now},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Plaza store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread and flatten its result.
  pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

pub(crate) fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
  P: Params,
  F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
  let mut stmt = conn.prepare_cached(sql)?;
  let rows = stmt
    .query_map(params, map)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub(crate) fn count<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<u64> {
  let n: i64 = conn.query_row(sql, params, |r| r.get(0))?;
  Ok(n as u64)
}

/// `LIMIT`/`OFFSET` bind values for a page request.
pub(crate) fn page_bounds(page: PageRequest) -> (i64, i64) {
  (page.limit() as i64, page.offset() as i64)
}

pub(crate) fn paged<T>(items: Vec<T>, total: u64, page: PageRequest) -> Paged<T> {
  Paged::new(items, total, page)
}

pub(crate) fn find_user(conn: &Connection, id: UserId) -> Result<Option<UserIdentity>> {
  let raw = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
      [id.get()],
      RawUser::from_row,
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

pub(crate) fn require_user(conn: &Connection, id: UserId) -> Result<UserIdentity> {
  find_user(conn, id)?.ok_or_else(|| CoreError::UserNotFound(id.to_string()).into())
}

/// Like [`require_user`], but inactive accounts count as missing.
pub(crate) fn require_active_user(conn: &Connection, id: UserId) -> Result<UserIdentity> {
  match find_user(conn, id)? {
    Some(user) if user.is_active => Ok(user),
    _ => Err(CoreError::UserNotFound(id.to_string()).into()),
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = crate::Error;

  async fn create_user(&self, new: NewUser) -> Result<UserIdentity> {
    let new = new.normalized()?;

    let user = self
      .with_conn(move |conn| {
        let taken = conn
          .query_row("SELECT 1 FROM users WHERE username = ?1", [&new.username], |_| Ok(()))
          .optional()?
          .is_some();
        if taken {
          return Err(CoreError::UsernameTaken(new.username).into());
        }
        conn.execute(
          "INSERT INTO users (username, display_name, avatar_url, is_active, created_at)
           VALUES (?1, ?2, ?3, 1, ?4)",
          rusqlite::params![new.username, new.display_name, new.avatar_url, now()],
        )?;
        require_user(conn, UserId(conn.last_insert_rowid()))
      })
      .await?;

    tracing::info!(user = %user.id, username = %user.username, "user created");
    Ok(user)
  }

  async fn get_user(&self, id: UserId) -> Result<Option<UserIdentity>> {
    self.with_conn(move |conn| find_user(conn, id)).await
  }

  async fn get_user_by_username(&self, username: String) -> Result<Option<UserIdentity>> {
    let username = username.trim().to_lowercase();
    self
      .with_conn(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            [&username],
            RawUser::from_row,
          )
          .optional()?;
        raw.map(RawUser::into_user).transpose()
      })
      .await
  }

  async fn users_by_ids(&self, ids: Vec<UserId>) -> Result<Vec<UserIdentity>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let raws = self
      .with_conn(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        query_all(
          conn,
          &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id IN ({placeholders}) ORDER BY user_id"),
          rusqlite::params_from_iter(ids.iter().map(|id| id.get())),
          RawUser::from_row,
        )
      })
      .await?;
    tracing::debug!(found = raws.len(), "batch user lookup");
    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn list_users(&self, page: PageRequest) -> Result<Paged<UserIdentity>> {
    let (limit, offset) = page_bounds(page);
    let (raws, total) = self
      .with_conn(move |conn| {
        let total = count(conn, "SELECT COUNT(*) FROM users", ())?;
        let raws = query_all(
          conn,
          &format!("SELECT {USER_COLUMNS} FROM users ORDER BY user_id LIMIT ?1 OFFSET ?2"),
          [limit, offset],
          RawUser::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawUser::into_user).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn update_profile(&self, id: UserId, patch: ProfilePatch) -> Result<UserIdentity> {
    let user = self
      .with_conn(move |conn| {
        let mut user = require_user(conn, id)?;
        patch.apply(&mut user)?;
        conn.execute(
          "UPDATE users SET display_name = ?2, avatar_url = ?3 WHERE user_id = ?1",
          rusqlite::params![id.get(), user.display_name, user.avatar_url],
        )?;
        Ok(user)
      })
      .await?;
    tracing::info!(user = %id, "profile updated");
    Ok(user)
  }

  async fn set_active(&self, id: UserId, active: bool) -> Result<UserIdentity> {
    let user = self
      .with_conn(move |conn| {
        let changed = conn.execute(
          "UPDATE users SET is_active = ?2 WHERE user_id = ?1",
          rusqlite::params![id.get(), active],
        )?;
        if changed == 0 {
          return Err(CoreError::UserNotFound(id.to_string()).into());
        }
        require_user(conn, id)
      })
      .await?;
    tracing::info!(user = %id, active, "account state changed");
    Ok(user)
  }
}
