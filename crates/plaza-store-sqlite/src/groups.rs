//! [`GroupStore`] for [`SqliteStore`].
//!
//! Each mutation loads the group and the relevant memberships, asks the core
//! planner for a [`Transition`], then writes the membership row and the
//! `member_count` delta in one transaction.

use plaza_core::{
  Error as CoreError, GroupId, UserId,
  group::{
    GroupEntity, GroupPatch, GroupView, JoinDecision, MemberFilter, MemberPatch, MemberRole,
    MembershipChange, MembershipEdge, MembershipStatus, NewGroup, Transition, apply_member_patch,
    check_delete, check_view, plan_invite, plan_join, plan_leave, plan_remove, plan_review,
    require_admin,
  },
  page::{PageRequest, Paged},
  store::GroupStore,
};
use rusqlite::{Connection, OptionalExtension as _, ToSql, Transaction, TransactionBehavior};

use crate::{
  Result,
  encode::{GROUP_COLUMNS, MEMBER_COLUMNS, RawGroup, RawMember, now},
  store::{SqliteStore, count, page_bounds, paged, query_all, require_user},
};

// ─── Row access ──────────────────────────────────────────────────────────────

fn find_group(conn: &Connection, id: GroupId) -> Result<Option<GroupEntity>> {
  let raw = conn
    .query_row(
      &format!("SELECT {GROUP_COLUMNS} FROM user_groups g WHERE g.group_id = ?1"),
      [id.get()],
      RawGroup::from_row,
    )
    .optional()?;
  raw.map(RawGroup::into_group).transpose()
}

fn require_group(conn: &Connection, id: GroupId) -> Result<GroupEntity> {
  find_group(conn, id)?.ok_or_else(|| CoreError::GroupNotFound(id).into())
}

fn find_membership(conn: &Connection, group: GroupId, user: UserId) -> Result<Option<MembershipEdge>> {
  let raw = conn
    .query_row(
      &format!("SELECT {MEMBER_COLUMNS} FROM group_members WHERE group_id = ?1 AND user_id = ?2"),
      [group.get(), user.get()],
      RawMember::from_row,
    )
    .optional()?;
  raw.map(RawMember::into_member).transpose()
}

fn find_member_by_id(conn: &Connection, member_id: i64) -> Result<Option<MembershipEdge>> {
  let raw = conn
    .query_row(
      &format!("SELECT {MEMBER_COLUMNS} FROM group_members WHERE member_id = ?1"),
      [member_id],
      RawMember::from_row,
    )
    .optional()?;
  raw.map(RawMember::into_member).transpose()
}

fn write_group(conn: &Connection, group: &GroupEntity) -> Result<()> {
  conn.execute(
    "UPDATE user_groups
     SET name = ?2, description = ?3, privacy = ?4, cover_image = ?5, avatar = ?6, updated_at = ?7
     WHERE group_id = ?1",
    rusqlite::params![
      group.id.get(),
      group.name,
      group.description,
      group.privacy.as_ref(),
      group.cover_image,
      group.avatar,
      now(),
    ],
  )?;
  Ok(())
}

/// Write a membership change and its counter delta. Returns the id of the
/// membership row that still exists afterwards.
fn apply_transition(tx: &Transaction<'_>, group: GroupId, transition: Transition) -> Result<Option<i64>> {
  let at = now();
  let id = match transition.change {
    MembershipChange::Insert { user_id, role, status, nickname } => {
      tx.execute(
        "INSERT INTO group_members (group_id, user_id, role, nickname, is_muted, status, joined_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        rusqlite::params![group.get(), user_id.get(), role.as_ref(), nickname, status.as_ref(), at],
      )?;
      Some(tx.last_insert_rowid())
    }
    MembershipChange::SetStatus { id, status } => {
      tx.execute(
        "UPDATE group_members SET status = ?2, joined_at = ?3 WHERE member_id = ?1",
        rusqlite::params![id, status.as_ref(), at],
      )?;
      Some(id)
    }
    MembershipChange::Delete { id } => {
      tx.execute("DELETE FROM group_members WHERE member_id = ?1", [id])?;
      None
    }
  };

  if transition.delta != 0 {
    tx.execute(
      "UPDATE user_groups SET member_count = member_count + ?2 WHERE group_id = ?1",
      [group.get(), transition.delta],
    )?;
  }
  Ok(id)
}

fn load_member(conn: &Connection, id: Option<i64>) -> Result<MembershipEdge> {
  id.map(|id| find_member_by_id(conn, id))
    .transpose()?
    .flatten()
    .ok_or_else(|| CoreError::MemberNotFound.into())
}

// ─── Transactions ────────────────────────────────────────────────────────────

fn create_group_tx(
  conn: &mut Connection,
  creator: UserId,
  new: NewGroup,
) -> Result<(GroupEntity, MembershipEdge)> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  require_user(&tx, creator)?;

  let at = now();
  tx.execute(
    "INSERT INTO user_groups
       (name, description, privacy, cover_image, avatar, created_by, member_count, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
    rusqlite::params![
      new.name,
      new.description,
      new.privacy.as_ref(),
      new.cover_image,
      new.avatar,
      creator.get(),
      at,
    ],
  )?;
  let id = GroupId(tx.last_insert_rowid());

  let creator_edge = Transition {
    change: MembershipChange::Insert {
      user_id:  creator,
      role:     MemberRole::Admin,
      status:   MembershipStatus::Approved,
      nickname: None,
    },
    delta:  1,
  };
  let member_id = apply_transition(&tx, id, creator_edge)?;

  let group = require_group(&tx, id)?;
  let membership = load_member(&tx, member_id)?;
  tx.commit()?;
  Ok((group, membership))
}

/// Shared shape of every membership mutation: load the group, let `plan`
/// decide, apply the transition, commit.
fn membership_tx<F>(conn: &mut Connection, group: GroupId, plan: F) -> Result<Option<MembershipEdge>>
where
  F: FnOnce(&Connection, &GroupEntity) -> Result<Transition>,
{
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let entity = require_group(&tx, group)?;
  let transition = plan(&*tx, &entity)?;
  let id = apply_transition(&tx, group, transition)?;
  let edge = id.map(|id| load_member(&tx, Some(id))).transpose()?;
  tx.commit()?;
  Ok(edge)
}

fn update_member_tx(
  conn: &mut Connection,
  actor: UserId,
  group: GroupId,
  member_id: i64,
  patch: MemberPatch,
) -> Result<MembershipEdge> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let entity = require_group(&tx, group)?;
  let actor_membership = find_membership(&tx, group, actor)?;
  let mut target = find_member_by_id(&tx, member_id)?.ok_or(CoreError::MemberNotFound)?;

  apply_member_patch(&entity, actor, actor_membership.as_ref(), &mut target, patch)?;
  tx.execute(
    "UPDATE group_members SET nickname = ?2, role = ?3, is_muted = ?4 WHERE member_id = ?1",
    rusqlite::params![target.id, target.nickname, target.role.as_ref(), target.is_muted],
  )?;
  tx.commit()?;
  Ok(target)
}

fn list_groups_where(
  conn: &Connection,
  from_where: &str,
  params: &[&dyn ToSql],
  page: PageRequest,
) -> Result<(Vec<RawGroup>, u64)> {
  let (limit, offset) = page_bounds(page);
  let total = count(conn, &format!("SELECT COUNT(*) {from_where}"), params)?;

  let mut bound: Vec<&dyn ToSql> = params.to_vec();
  bound.push(&limit);
  bound.push(&offset);
  let raws = query_all(
    conn,
    &format!(
      "SELECT {GROUP_COLUMNS} {from_where}
       ORDER BY g.created_at DESC, g.group_id DESC LIMIT ? OFFSET ?"
    ),
    bound.as_slice(),
    RawGroup::from_row,
  )?;
  Ok((raws, total))
}

// ─── GroupStore impl ─────────────────────────────────────────────────────────

impl GroupStore for SqliteStore {
  async fn create_group(&self, creator: UserId, new: NewGroup) -> Result<(GroupEntity, MembershipEdge)> {
    let new = new.validated()?;
    let (group, membership) = self
      .with_conn(move |conn| create_group_tx(conn, creator, new))
      .await?;
    tracing::info!(group = %group.id, %creator, "group created");
    Ok((group, membership))
  }

  async fn get_group(&self, id: GroupId) -> Result<Option<GroupEntity>> {
    self.with_conn(move |conn| find_group(conn, id)).await
  }

  async fn view_group(&self, viewer: Option<UserId>, id: GroupId) -> Result<GroupView> {
    self
      .with_conn(move |conn| {
        let group = require_group(conn, id)?;
        let membership = viewer
          .map(|v| find_membership(conn, id, v))
          .transpose()?
          .flatten();
        check_view(&group, membership.as_ref())?;
        Ok(GroupView { group, membership })
      })
      .await
  }

  async fn membership(&self, group: GroupId, user: UserId) -> Result<Option<MembershipEdge>> {
    self.with_conn(move |conn| find_membership(conn, group, user)).await
  }

  async fn update_group(&self, actor: UserId, id: GroupId, patch: GroupPatch) -> Result<GroupEntity> {
    let group = self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut group = require_group(&tx, id)?;
        require_admin(find_membership(&tx, id, actor)?.as_ref())?;
        patch.apply(&mut group)?;
        write_group(&tx, &group)?;
        let group = require_group(&tx, id)?;
        tx.commit()?;
        Ok(group)
      })
      .await?;
    tracing::info!(group = %id, %actor, "group updated");
    Ok(group)
  }

  async fn delete_group(&self, actor: UserId, id: GroupId) -> Result<()> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let group = require_group(&tx, id)?;
        check_delete(&group, actor, find_membership(&tx, id, actor)?.as_ref())?;
        tx.execute("DELETE FROM user_groups WHERE group_id = ?1", [id.get()])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    tracing::info!(group = %id, %actor, "group deleted");
    Ok(())
  }

  async fn list_groups(&self, page: PageRequest) -> Result<Paged<GroupEntity>> {
    let (raws, total) = self
      .with_conn(move |conn| {
        list_groups_where(conn, "FROM user_groups g WHERE g.privacy = 'public'", &[], page)
      })
      .await?;
    let items = raws.into_iter().map(RawGroup::into_group).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn list_user_groups(&self, user: UserId, page: PageRequest) -> Result<Paged<GroupEntity>> {
    let (raws, total) = self
      .with_conn(move |conn| {
        let user_id = user.get();
        list_groups_where(
          conn,
          "FROM user_groups g
           JOIN group_members m ON m.group_id = g.group_id
           WHERE m.user_id = ?1 AND m.status = 'approved'",
          &[&user_id],
          page,
        )
      })
      .await?;
    let items = raws.into_iter().map(RawGroup::into_group).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }

  async fn join(&self, user: UserId, group: GroupId, nickname: Option<String>) -> Result<MembershipEdge> {
    let edge = self
      .with_conn(move |conn| {
        membership_tx(conn, group, |tx, entity| {
          require_user(tx, user)?;
          let existing = find_membership(tx, group, user)?;
          Ok(plan_join(entity, user, existing.as_ref(), nickname)?)
        })
      })
      .await?;
    let edge = edge.ok_or(CoreError::MemberNotFound)?;
    tracing::info!(%group, %user, status = edge.status.as_ref(), "joined group");
    Ok(edge)
  }

  async fn leave(&self, user: UserId, group: GroupId) -> Result<()> {
    self
      .with_conn(move |conn| {
        membership_tx(conn, group, |tx, entity| {
          let existing = find_membership(tx, group, user)?;
          Ok(plan_leave(entity, user, existing.as_ref())?)
        })
      })
      .await?;
    tracing::info!(%group, %user, "left group");
    Ok(())
  }

  async fn invite(&self, actor: UserId, group: GroupId, target: UserId) -> Result<MembershipEdge> {
    let edge = self
      .with_conn(move |conn| {
        membership_tx(conn, group, |tx, entity| {
          let actor_membership = find_membership(tx, group, actor)?;
          let existing = find_membership(tx, group, target)?;
          let transition = plan_invite(entity, actor_membership.as_ref(), target, existing.as_ref())?;
          require_user(tx, target)?;
          Ok(transition)
        })
      })
      .await?;
    let edge = edge.ok_or(CoreError::MemberNotFound)?;
    tracing::info!(%group, %actor, %target, "member invited");
    Ok(edge)
  }

  async fn review_join(
    &self,
    actor: UserId,
    group: GroupId,
    target: UserId,
    decision: JoinDecision,
  ) -> Result<MembershipEdge> {
    let edge = self
      .with_conn(move |conn| {
        membership_tx(conn, group, |tx, _| {
          let actor_membership = find_membership(tx, group, actor)?;
          let existing = find_membership(tx, group, target)?;
          Ok(plan_review(actor_membership.as_ref(), target, existing.as_ref(), decision)?)
        })
      })
      .await?;
    let edge = edge.ok_or(CoreError::MemberNotFound)?;
    tracing::info!(%group, %actor, %target, decision = decision.as_ref(), "join request reviewed");
    Ok(edge)
  }

  async fn remove_member(&self, actor: UserId, group: GroupId, target: UserId) -> Result<()> {
    self
      .with_conn(move |conn| {
        membership_tx(conn, group, |tx, entity| {
          let actor_membership = find_membership(tx, group, actor)?;
          let existing = find_membership(tx, group, target)?;
          Ok(plan_remove(entity, actor_membership.as_ref(), target, existing.as_ref())?)
        })
      })
      .await?;
    tracing::info!(%group, %actor, %target, "member removed");
    Ok(())
  }

  async fn update_member(
    &self,
    actor: UserId,
    group: GroupId,
    member_id: i64,
    patch: MemberPatch,
  ) -> Result<MembershipEdge> {
    let edge = self
      .with_conn(move |conn| update_member_tx(conn, actor, group, member_id, patch))
      .await?;
    tracing::info!(%group, %actor, member = member_id, "member updated");
    Ok(edge)
  }

  async fn list_members(
    &self,
    viewer: Option<UserId>,
    group: GroupId,
    filter: MemberFilter,
    page: PageRequest,
  ) -> Result<Paged<MembershipEdge>> {
    let (limit, offset) = page_bounds(page);
    let role = filter.role.map(|r| r.as_ref().to_owned());
    let status = filter.status.map(|s| s.as_ref().to_owned());

    let (raws, total) = self
      .with_conn(move |conn| {
        let entity = require_group(conn, group)?;
        let membership = viewer
          .map(|v| find_membership(conn, group, v))
          .transpose()?
          .flatten();
        check_view(&entity, membership.as_ref())?;

        let filter = "group_id = ?1 AND (?2 IS NULL OR role = ?2) AND (?3 IS NULL OR status = ?3)";
        let total = count(
          conn,
          &format!("SELECT COUNT(*) FROM group_members WHERE {filter}"),
          rusqlite::params![group.get(), role, status],
        )?;
        let raws = query_all(
          conn,
          &format!(
            "SELECT {MEMBER_COLUMNS} FROM group_members WHERE {filter}
             ORDER BY joined_at ASC, member_id ASC LIMIT ?4 OFFSET ?5"
          ),
          rusqlite::params![group.get(), role, status, limit, offset],
          RawMember::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws.into_iter().map(RawMember::into_member).collect::<Result<_>>()?;
    Ok(paged(items, total, page))
  }
}
