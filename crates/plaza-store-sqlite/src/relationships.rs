//! [`RelationshipStore`] for [`SqliteStore`].

use plaza_core::{
  UserId,
  page::{PageRequest, Paged},
  relationship::{
    EdgeChange, RelationshipAction, RelationshipEdge, RelationshipStatus, RequestDirection,
    plan_action,
  },
  store::RelationshipStore,
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};

use crate::{
  Result,
  encode::{EDGE_COLUMNS, RawEdge, now},
  store::{SqliteStore, count, page_bounds, paged, query_all, require_active_user, require_user},
};

/// The single edge between `a` and `b`, in either direction.
pub(crate) fn find_edge(conn: &Connection, a: UserId, b: UserId) -> Result<Option<RelationshipEdge>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {EDGE_COLUMNS} FROM relationships
         WHERE (initiator_id = ?1 AND recipient_id = ?2)
            OR (initiator_id = ?2 AND recipient_id = ?1)"
      ),
      [a.get(), b.get()],
      RawEdge::from_row,
    )
    .optional()?;
  raw.map(RawEdge::into_edge).transpose()
}

pub(crate) fn are_friends(conn: &Connection, a: UserId, b: UserId) -> Result<bool> {
  Ok(
    find_edge(conn, a, b)?
      .is_some_and(|e| e.status == RelationshipStatus::Accepted),
  )
}

fn load_edge(conn: &Connection, id: i64) -> Result<RelationshipEdge> {
  conn
    .query_row(
      &format!("SELECT {EDGE_COLUMNS} FROM relationships WHERE relationship_id = ?1"),
      [id],
      RawEdge::from_row,
    )?
    .into_edge()
}

fn apply_action(
  conn: &mut Connection,
  actor: UserId,
  target: UserId,
  action: RelationshipAction,
) -> Result<Option<RelationshipEdge>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let existing = find_edge(&tx, actor, target)?;
  let change = plan_action(existing.as_ref(), actor, target, action)?;
  if matches!(action, RelationshipAction::Request | RelationshipAction::Block) {
    require_user(&tx, actor)?;
    require_active_user(&tx, target)?;
  }

  let at = now();
  let id = match change {
    EdgeChange::Insert { initiator, recipient, status } => {
      tx.execute(
        "INSERT INTO relationships (initiator_id, recipient_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        rusqlite::params![initiator.get(), recipient.get(), status.as_ref(), at],
      )?;
      Some(tx.last_insert_rowid())
    }
    EdgeChange::SetStatus { id, status } => {
      tx.execute(
        "UPDATE relationships SET status = ?2, updated_at = ?3 WHERE relationship_id = ?1",
        rusqlite::params![id, status.as_ref(), at],
      )?;
      Some(id)
    }
    EdgeChange::Reassign { id, initiator, recipient, status } => {
      tx.execute(
        "UPDATE relationships
         SET initiator_id = ?2, recipient_id = ?3, status = ?4, updated_at = ?5
         WHERE relationship_id = ?1",
        rusqlite::params![id, initiator.get(), recipient.get(), status.as_ref(), at],
      )?;
      Some(id)
    }
    EdgeChange::Delete { id } => {
      tx.execute("DELETE FROM relationships WHERE relationship_id = ?1", [id])?;
      None
    }
  };

  let edge = id.map(|id| load_edge(&tx, id)).transpose()?;
  tx.commit()?;
  Ok(edge)
}

impl RelationshipStore for SqliteStore {
  async fn perform_action(
    &self,
    actor: UserId,
    target: UserId,
    action: RelationshipAction,
  ) -> Result<Option<RelationshipEdge>> {
    let edge = self
      .with_conn(move |conn| apply_action(conn, actor, target, action))
      .await?;

    tracing::info!(
      %actor,
      %target,
      action = action.as_ref(),
      status = edge.as_ref().map(|e| e.status.as_ref()).unwrap_or("none"),
      "relationship updated"
    );
    Ok(edge)
  }

  async fn edge_between(&self, a: UserId, b: UserId) -> Result<Option<RelationshipEdge>> {
    self.with_conn(move |conn| find_edge(conn, a, b)).await
  }

  async fn list_accepted(&self, user: UserId, page: PageRequest) -> Result<Paged<RelationshipEdge>> {
    let (limit, offset) = page_bounds(page);
    let (raws, total) = self
      .with_conn(move |conn| {
        let filter = "status = 'accepted' AND (initiator_id = ?1 OR recipient_id = ?1)";
        let total = count(
          conn,
          &format!("SELECT COUNT(*) FROM relationships WHERE {filter}"),
          [user.get()],
        )?;
        let raws = query_all(
          conn,
          &format!(
            "SELECT {EDGE_COLUMNS} FROM relationships WHERE {filter}
             ORDER BY updated_at DESC, relationship_id DESC LIMIT ?2 OFFSET ?3"
          ),
          [user.get(), limit, offset],
          RawEdge::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawEdge::into_edge).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn friend_count(&self, user: UserId) -> Result<u64> {
    self
      .with_conn(move |conn| {
        count(
          conn,
          "SELECT COUNT(*) FROM relationships
           WHERE status = 'accepted' AND (initiator_id = ?1 OR recipient_id = ?1)",
          [user.get()],
        )
      })
      .await
  }

  async fn list_pending(
    &self,
    user: UserId,
    direction: RequestDirection,
    page: PageRequest,
  ) -> Result<Paged<RelationshipEdge>> {
    let (limit, offset) = page_bounds(page);
    let column = match direction {
      RequestDirection::Incoming => "recipient_id",
      RequestDirection::Outgoing => "initiator_id",
    };
    let (raws, total) = self
      .with_conn(move |conn| {
        let filter = format!("status = 'pending' AND {column} = ?1");
        let total = count(
          conn,
          &format!("SELECT COUNT(*) FROM relationships WHERE {filter}"),
          [user.get()],
        )?;
        let raws = query_all(
          conn,
          &format!(
            "SELECT {EDGE_COLUMNS} FROM relationships WHERE {filter}
             ORDER BY created_at DESC, relationship_id DESC LIMIT ?2 OFFSET ?3"
          ),
          [user.get(), limit, offset],
          RawEdge::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawEdge::into_edge).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn suggestion_candidates(&self, user: UserId) -> Result<Vec<UserId>> {
    let ids = self
      .with_conn(move |conn| {
        query_all(
          conn,
          "SELECT u.user_id FROM users u
           WHERE u.user_id != ?1
             AND u.is_active = 1
             AND NOT EXISTS (
               SELECT 1 FROM relationships r
               WHERE r.status IN ('pending', 'accepted', 'blocked')
                 AND ((r.initiator_id = ?1 AND r.recipient_id = u.user_id)
                   OR (r.recipient_id = ?1 AND r.initiator_id = u.user_id))
             )
           ORDER BY u.user_id",
          [user.get()],
          |row| row.get::<_, i64>(0),
        )
      })
      .await?;
    Ok(ids.into_iter().map(UserId).collect())
  }

  async fn mutual_count(&self, a: UserId, b: UserId) -> Result<u64> {
    self
      .with_conn(move |conn| {
        count(
          conn,
          "WITH friends_of(owner, friend) AS (
             SELECT initiator_id, recipient_id FROM relationships WHERE status = 'accepted'
             UNION ALL
             SELECT recipient_id, initiator_id FROM relationships WHERE status = 'accepted'
           )
           SELECT COUNT(*) FROM friends_of fa
           JOIN friends_of fb ON fa.friend = fb.friend
           WHERE fa.owner = ?1 AND fb.owner = ?2",
          [a.get(), b.get()],
        )
      })
      .await
  }
}
