//! The group membership ledger.
//!
//! Membership edges connect a user to a group. `member_count` on the group is
//! a derived counter equal to the number of `approved` edges; every planner
//! that changes that number returns the delta inside its [`Transition`] so the
//! store writes edge and counter in the same transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  ids::{GroupId, UserId},
};

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_NICKNAME_LEN: usize = 50;

// ─── Types ──────────────────────────────────────────────────────────────────

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
pub enum GroupPrivacy {
  #[default]
  Public,
  Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntity {
  pub id:           GroupId,
  pub name:         String,
  pub description:  String,
  pub privacy:      GroupPrivacy,
  pub cover_image:  Option<String>,
  pub avatar:       Option<String>,
  pub created_by:   UserId,
  pub member_count: i64,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemberRole {
  Member,
  Admin,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MembershipStatus {
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEdge {
  pub id:        i64,
  pub group_id:  GroupId,
  pub user_id:   UserId,
  pub role:      MemberRole,
  pub nickname:  Option<String>,
  pub is_muted:  bool,
  pub status:    MembershipStatus,
  pub joined_at: DateTime<Utc>,
  pub left_at:   Option<DateTime<Utc>>,
}

impl MembershipEdge {
  pub fn is_approved(&self) -> bool { self.status == MembershipStatus::Approved }
}

/// Input for creating a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub privacy:     GroupPrivacy,
  #[serde(default)]
  pub cover_image: Option<String>,
  #[serde(default)]
  pub avatar:      Option<String>,
}

impl NewGroup {
  pub fn validated(mut self) -> Result<Self> {
    self.name = validate_name(&self.name)?;
    validate_description(&self.description)?;
    Ok(self)
  }
}

/// Partial update of a group. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupPatch {
  pub name:        Option<String>,
  pub description: Option<String>,
  pub privacy:     Option<GroupPrivacy>,
  pub cover_image: Option<String>,
  pub avatar:      Option<String>,
}

impl GroupPatch {
  pub fn apply(self, group: &mut GroupEntity) -> Result<()> {
    if let Some(name) = self.name {
      group.name = validate_name(&name)?;
    }
    if let Some(description) = self.description {
      validate_description(&description)?;
      group.description = description;
    }
    if let Some(privacy) = self.privacy {
      group.privacy = privacy;
    }
    if let Some(cover) = self.cover_image {
      group.cover_image = Some(cover);
    }
    if let Some(avatar) = self.avatar {
      group.avatar = Some(avatar);
    }
    Ok(())
  }
}

/// Partial update of a membership. `role` and `is_muted` are admin-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberPatch {
  pub nickname: Option<String>,
  pub role:     Option<MemberRole>,
  pub is_muted: Option<bool>,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JoinDecision {
  Approve,
  Reject,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MemberFilter {
  pub role:   Option<MemberRole>,
  pub status: Option<MembershipStatus>,
}

/// A group as seen by one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupView {
  #[serde(flatten)]
  pub group:      GroupEntity,
  pub membership: Option<MembershipEdge>,
}

// ─── Transitions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipChange {
  Insert {
    user_id:  UserId,
    role:     MemberRole,
    status:   MembershipStatus,
    nickname: Option<String>,
  },
  SetStatus { id: i64, status: MembershipStatus },
  Delete { id: i64 },
}

/// A membership change plus its effect on `member_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub change: MembershipChange,
  pub delta:  i64,
}

impl Transition {
  fn new(change: MembershipChange, delta: i64) -> Self { Self { change, delta } }
}

// ─── Guards ─────────────────────────────────────────────────────────────────

pub fn is_active_admin(membership: Option<&MembershipEdge>) -> bool {
  membership.is_some_and(|m| m.is_approved() && m.role == MemberRole::Admin)
}

pub fn require_admin(membership: Option<&MembershipEdge>) -> Result<()> {
  if is_active_admin(membership) { Ok(()) } else { Err(Error::NotGroupAdmin) }
}

/// Private groups are visible only to approved members.
pub fn check_view(group: &GroupEntity, viewer: Option<&MembershipEdge>) -> Result<()> {
  match group.privacy {
    GroupPrivacy::Public => Ok(()),
    GroupPrivacy::Private if viewer.is_some_and(MembershipEdge::is_approved) => Ok(()),
    GroupPrivacy::Private => Err(Error::GroupForbidden(group.id)),
  }
}

/// The creator may always delete; otherwise an approved admin is required.
pub fn check_delete(
  group: &GroupEntity,
  actor: UserId,
  membership: Option<&MembershipEdge>,
) -> Result<()> {
  if group.created_by == actor {
    return Ok(());
  }
  require_admin(membership)
}

// ─── Planners ───────────────────────────────────────────────────────────────

pub fn plan_join(
  group: &GroupEntity,
  user: UserId,
  existing: Option<&MembershipEdge>,
  nickname: Option<String>,
) -> Result<Transition> {
  if existing.is_some() {
    return Err(Error::AlreadyMember(user, group.id));
  }
  let nickname = validate_nickname(nickname)?;
  let (status, delta) = match group.privacy {
    GroupPrivacy::Public => (MembershipStatus::Approved, 1),
    GroupPrivacy::Private => (MembershipStatus::Pending, 0),
  };
  Ok(Transition::new(
    MembershipChange::Insert { user_id: user, role: MemberRole::Member, status, nickname },
    delta,
  ))
}

pub fn plan_leave(
  group: &GroupEntity,
  user: UserId,
  existing: Option<&MembershipEdge>,
) -> Result<Transition> {
  let edge = existing
    .filter(|m| m.is_approved())
    .ok_or(Error::NotMember(user, group.id))?;
  if group.created_by == user {
    return Err(Error::CreatorCannotLeave);
  }
  Ok(Transition::new(MembershipChange::Delete { id: edge.id }, -1))
}

/// An admin invites an existing user; the invitation waits as a pending
/// membership until an admin approves it.
pub fn plan_invite(
  group: &GroupEntity,
  actor: Option<&MembershipEdge>,
  target: UserId,
  existing: Option<&MembershipEdge>,
) -> Result<Transition> {
  require_admin(actor)?;
  if existing.is_some() {
    return Err(Error::AlreadyMember(target, group.id));
  }
  Ok(Transition::new(
    MembershipChange::Insert {
      user_id:  target,
      role:     MemberRole::Member,
      status:   MembershipStatus::Pending,
      nickname: None,
    },
    0,
  ))
}

pub fn plan_review(
  actor: Option<&MembershipEdge>,
  target: UserId,
  existing: Option<&MembershipEdge>,
  decision: JoinDecision,
) -> Result<Transition> {
  require_admin(actor)?;
  let edge = existing.ok_or(Error::JoinRequestNotFound(target))?;
  if edge.status != MembershipStatus::Pending {
    return Err(Error::NotPending);
  }
  Ok(match decision {
    JoinDecision::Approve => Transition::new(
      MembershipChange::SetStatus { id: edge.id, status: MembershipStatus::Approved },
      1,
    ),
    JoinDecision::Reject => Transition::new(
      MembershipChange::SetStatus { id: edge.id, status: MembershipStatus::Rejected },
      0,
    ),
  })
}

pub fn plan_remove(
  group: &GroupEntity,
  actor: Option<&MembershipEdge>,
  target: UserId,
  existing: Option<&MembershipEdge>,
) -> Result<Transition> {
  require_admin(actor)?;
  if target == group.created_by {
    return Err(Error::CannotRemoveCreator);
  }
  let edge = existing
    .filter(|m| m.is_approved())
    .ok_or(Error::MemberNotFound)?;
  Ok(Transition::new(MembershipChange::Delete { id: edge.id }, -1))
}

/// Apply `patch` to `target` on behalf of `actor`. Approved admins may change
/// anything except the creator's role; an approved member may change only
/// their own nickname.
pub fn apply_member_patch(
  group: &GroupEntity,
  actor: UserId,
  actor_membership: Option<&MembershipEdge>,
  target: &mut MembershipEdge,
  patch: MemberPatch,
) -> Result<()> {
  if target.group_id != group.id {
    return Err(Error::MemberNotFound);
  }
  let nickname = validate_nickname(patch.nickname)?;

  if is_active_admin(actor_membership) {
    if let Some(role) = patch.role {
      if target.user_id == group.created_by && role != MemberRole::Admin {
        return Err(Error::CreatorRoleLocked);
      }
      target.role = role;
    }
    if let Some(muted) = patch.is_muted {
      target.is_muted = muted;
    }
  } else {
    let own = target.user_id == actor && actor_membership.is_some_and(|m| m.is_approved());
    if !own || patch.role.is_some() || patch.is_muted.is_some() {
      return Err(Error::NotGroupAdmin);
    }
  }

  if nickname.is_some() {
    target.nickname = nickname;
  }
  Ok(())
}

// ─── Validation ─────────────────────────────────────────────────────────────

fn validate_name(name: &str) -> Result<String> {
  let name = name.trim();
  if !NAME_LEN.contains(&name.chars().count()) {
    return Err(Error::InvalidInput("group name must be 3-100 characters".to_owned()));
  }
  Ok(name.to_owned())
}

fn validate_description(description: &str) -> Result<()> {
  if description.chars().count() > MAX_DESCRIPTION_LEN {
    return Err(Error::InvalidInput(
      "group description must be at most 1000 characters".to_owned(),
    ));
  }
  Ok(())
}

fn validate_nickname(nickname: Option<String>) -> Result<Option<String>> {
  match nickname.map(|n| n.trim().to_owned()) {
    Some(n) if n.is_empty() => Ok(None),
    Some(n) if n.chars().count() > MAX_NICKNAME_LEN => Err(Error::InvalidInput(
      "nickname must be at most 50 characters".to_owned(),
    )),
    other => Ok(other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CREATOR: UserId = UserId(1);
  const ALICE: UserId = UserId(2);
  const BOB: UserId = UserId(3);

  fn group(privacy: GroupPrivacy) -> GroupEntity {
    GroupEntity {
      id: GroupId(10),
      name: "rustaceans".into(),
      description: String::new(),
      privacy,
      cover_image: None,
      avatar: None,
      created_by: CREATOR,
      member_count: 1,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  fn membership(id: i64, user: UserId, role: MemberRole, status: MembershipStatus) -> MembershipEdge {
    MembershipEdge {
      id,
      group_id: GroupId(10),
      user_id: user,
      role,
      nickname: None,
      is_muted: false,
      status,
      joined_at: Utc::now(),
      left_at: None,
    }
  }

  fn creator_edge() -> MembershipEdge {
    membership(1, CREATOR, MemberRole::Admin, MembershipStatus::Approved)
  }

  #[test]
  fn public_join_is_approved_and_counted() {
    let t = plan_join(&group(GroupPrivacy::Public), ALICE, None, None).unwrap();
    assert_eq!(t.delta, 1);
    assert!(matches!(
      t.change,
      MembershipChange::Insert { status: MembershipStatus::Approved, .. }
    ));
  }

  #[test]
  fn private_join_waits_uncounted() {
    let t = plan_join(&group(GroupPrivacy::Private), ALICE, None, Some("al".into())).unwrap();
    assert_eq!(t.delta, 0);
    assert!(matches!(
      t.change,
      MembershipChange::Insert { status: MembershipStatus::Pending, .. }
    ));
  }

  #[test]
  fn join_with_any_existing_edge_conflicts() {
    let rejected = membership(5, ALICE, MemberRole::Member, MembershipStatus::Rejected);
    assert_eq!(
      plan_join(&group(GroupPrivacy::Public), ALICE, Some(&rejected), None),
      Err(Error::AlreadyMember(ALICE, GroupId(10)))
    );
  }

  #[test]
  fn creator_cannot_leave_or_be_removed() {
    let g = group(GroupPrivacy::Public);
    let creator = creator_edge();
    assert_eq!(plan_leave(&g, CREATOR, Some(&creator)), Err(Error::CreatorCannotLeave));

    let other_admin = membership(2, ALICE, MemberRole::Admin, MembershipStatus::Approved);
    assert_eq!(
      plan_remove(&g, Some(&other_admin), CREATOR, Some(&creator)),
      Err(Error::CannotRemoveCreator)
    );
  }

  #[test]
  fn leave_requires_approved_membership() {
    let g = group(GroupPrivacy::Private);
    let pending = membership(5, ALICE, MemberRole::Member, MembershipStatus::Pending);
    assert_eq!(plan_leave(&g, ALICE, Some(&pending)), Err(Error::NotMember(ALICE, g.id)));
    assert_eq!(plan_leave(&g, ALICE, None), Err(Error::NotMember(ALICE, g.id)));

    let approved = membership(5, ALICE, MemberRole::Member, MembershipStatus::Approved);
    let t = plan_leave(&g, ALICE, Some(&approved)).unwrap();
    assert_eq!(t, Transition::new(MembershipChange::Delete { id: 5 }, -1));
  }

  #[test]
  fn review_needs_admin_and_pending_request() {
    let pending = membership(5, ALICE, MemberRole::Member, MembershipStatus::Pending);
    let member = membership(6, BOB, MemberRole::Member, MembershipStatus::Approved);
    assert_eq!(
      plan_review(Some(&member), ALICE, Some(&pending), JoinDecision::Approve),
      Err(Error::NotGroupAdmin)
    );

    let admin = creator_edge();
    let approve = plan_review(Some(&admin), ALICE, Some(&pending), JoinDecision::Approve).unwrap();
    assert_eq!(approve.delta, 1);
    let reject = plan_review(Some(&admin), ALICE, Some(&pending), JoinDecision::Reject).unwrap();
    assert_eq!(reject.delta, 0);

    assert_eq!(
      plan_review(Some(&admin), BOB, Some(&member), JoinDecision::Approve),
      Err(Error::NotPending)
    );
    assert_eq!(
      plan_review(Some(&admin), BOB, None, JoinDecision::Approve),
      Err(Error::JoinRequestNotFound(BOB))
    );
  }

  #[test]
  fn private_group_hidden_from_non_members() {
    let g = group(GroupPrivacy::Private);
    let pending = membership(5, ALICE, MemberRole::Member, MembershipStatus::Pending);
    assert_eq!(check_view(&g, None), Err(Error::GroupForbidden(g.id)));
    assert_eq!(check_view(&g, Some(&pending)), Err(Error::GroupForbidden(g.id)));
    assert_eq!(check_view(&g, Some(&creator_edge())), Ok(()));
    assert_eq!(check_view(&group(GroupPrivacy::Public), None), Ok(()));
  }

  #[test]
  fn delete_allowed_for_creator_or_admin() {
    let g = group(GroupPrivacy::Public);
    assert_eq!(check_delete(&g, CREATOR, None), Ok(()));
    let member = membership(6, BOB, MemberRole::Member, MembershipStatus::Approved);
    assert_eq!(check_delete(&g, BOB, Some(&member)), Err(Error::NotGroupAdmin));
  }

  #[test]
  fn member_may_only_rename_self() {
    let g = group(GroupPrivacy::Public);
    let alice = membership(5, ALICE, MemberRole::Member, MembershipStatus::Approved);
    let mut own = alice.clone();
    apply_member_patch(&g, ALICE, Some(&alice), &mut own, MemberPatch {
      nickname: Some("ali".into()),
      ..Default::default()
    })
    .unwrap();
    assert_eq!(own.nickname.as_deref(), Some("ali"));

    let mut own = alice.clone();
    let promote = MemberPatch { role: Some(MemberRole::Admin), ..Default::default() };
    assert_eq!(
      apply_member_patch(&g, ALICE, Some(&alice), &mut own, promote),
      Err(Error::NotGroupAdmin)
    );

    let mut bob = membership(6, BOB, MemberRole::Member, MembershipStatus::Approved);
    let rename = MemberPatch { nickname: Some("b".into()), ..Default::default() };
    assert_eq!(
      apply_member_patch(&g, ALICE, Some(&alice), &mut bob, rename),
      Err(Error::NotGroupAdmin)
    );
  }

  #[test]
  fn admin_cannot_demote_creator() {
    let g = group(GroupPrivacy::Public);
    let admin = membership(2, ALICE, MemberRole::Admin, MembershipStatus::Approved);
    let mut creator = creator_edge();
    let demote = MemberPatch { role: Some(MemberRole::Member), ..Default::default() };
    assert_eq!(
      apply_member_patch(&g, ALICE, Some(&admin), &mut creator, demote),
      Err(Error::CreatorRoleLocked)
    );

    let mut bob = membership(6, BOB, MemberRole::Member, MembershipStatus::Approved);
    let mute = MemberPatch { is_muted: Some(true), ..Default::default() };
    apply_member_patch(&g, ALICE, Some(&admin), &mut bob, mute).unwrap();
    assert!(bob.is_muted);
  }

  #[test]
  fn names_are_validated() {
    let bad = NewGroup {
      name:        "ab".into(),
      description: String::new(),
      privacy:     GroupPrivacy::Public,
      cover_image: None,
      avatar:      None,
    };
    assert!(matches!(bad.validated(), Err(Error::InvalidInput(_))));

    let mut g = group(GroupPrivacy::Public);
    let patch = GroupPatch { name: Some("  crab club ".into()), ..Default::default() };
    patch.apply(&mut g).unwrap();
    assert_eq!(g.name, "crab club");
  }
}
