//! Error types for `plaza-core`.

use serde::Serialize;
use thiserror::Error;

use crate::ids::{GroupId, PostId, UserId};

/// Stable, enumerable failure categories. The HTTP layer translates these to
/// status codes; nothing below it knows about HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  Forbidden,
  Conflict,
  InvalidState,
  InvalidInput,
  Upstream,
  Internal,
}

/// Implemented by every error type that crosses a store or resolver boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  // ── Relationship ledger ──────────────────────────────────────────────────
  #[error("cannot target yourself with a relationship action")]
  SelfRelationship,

  #[error("users {0} and {1} are already friends")]
  AlreadyFriends(UserId, UserId),

  #[error("a pending request already exists between {0} and {1}")]
  RequestAlreadyExists(UserId, UserId),

  #[error("relationship between {0} and {1} is blocked")]
  PairBlocked(UserId, UserId),

  #[error("no relationship exists between {0} and {1}")]
  EdgeNotFound(UserId, UserId),

  #[error("only the recipient may answer this request")]
  NotRecipient,

  #[error("only the sender may cancel this request")]
  NotInitiator,

  #[error("only the user who placed the block may lift it")]
  NotBlocker,

  #[error("users {0} and {1} are not friends")]
  NotFriends(UserId, UserId),

  #[error("request is not pending")]
  NotPending,

  // ── Identity ─────────────────────────────────────────────────────────────
  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("username already taken: {0}")]
  UsernameTaken(String),

  // ── Group ledger ─────────────────────────────────────────────────────────
  #[error("group not found: {0}")]
  GroupNotFound(GroupId),

  #[error("group {0} is private")]
  GroupForbidden(GroupId),

  #[error("group admin rights required")]
  NotGroupAdmin,

  #[error("user {0} already has a membership in group {1}")]
  AlreadyMember(UserId, GroupId),

  #[error("user {0} is not a member of group {1}")]
  NotMember(UserId, GroupId),

  #[error("the group creator cannot leave; delete the group instead")]
  CreatorCannotLeave,

  #[error("the group creator cannot be removed")]
  CannotRemoveCreator,

  #[error("the group creator must remain an admin")]
  CreatorRoleLocked,

  #[error("member not found")]
  MemberNotFound,

  #[error("no join request from user {0}")]
  JoinRequestNotFound(UserId),

  // ── Content ──────────────────────────────────────────────────────────────
  #[error("post not found: {0}")]
  PostNotFound(PostId),

  #[error("only the author may modify post {0}")]
  NotPostAuthor(PostId),

  #[error("invalid input: {0}")]
  InvalidInput(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    use Error::*;
    match self {
      EdgeNotFound(..)
      | UserNotFound(_)
      | GroupNotFound(_)
      | MemberNotFound
      | JoinRequestNotFound(_)
      | PostNotFound(_) => ErrorKind::NotFound,

      PairBlocked(..)
      | NotRecipient
      | NotInitiator
      | NotBlocker
      | GroupForbidden(_)
      | NotGroupAdmin
      | CreatorCannotLeave
      | CannotRemoveCreator
      | CreatorRoleLocked
      | NotPostAuthor(_) => ErrorKind::Forbidden,

      AlreadyFriends(..)
      | RequestAlreadyExists(..)
      | UsernameTaken(_)
      | AlreadyMember(..) => ErrorKind::Conflict,

      NotFriends(..) | NotPending | NotMember(..) => ErrorKind::InvalidState,

      SelfRelationship | InvalidInput(_) => ErrorKind::InvalidInput,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
