//! The relationship (friendship) ledger.
//!
//! A pair of users is connected by at most one [`RelationshipEdge`]. The edge
//! is directed: the initiator sent the request (or placed the block), the
//! recipient answers it. [`plan_action`] is the whole transition table; a
//! store loads the current edge for the unordered pair, asks for a plan and
//! applies the resulting [`EdgeChange`] inside one transaction.

use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, ids::UserId};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;
pub const MAX_SUGGESTION_LIMIT: usize = 50;

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
pub enum RelationshipStatus {
  Pending,
  Accepted,
  /// Terminal: a later `request` reuses the row.
  Rejected,
  Blocked,
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
pub enum RelationshipAction {
  Request,
  Accept,
  Reject,
  Cancel,
  Unfriend,
  Block,
  Unblock,
}

/// Which side of a pending request to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDirection {
  /// Requests sent to the user.
  #[default]
  Incoming,
  /// Requests the user sent.
  Outgoing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
  pub id:           i64,
  pub initiator_id: UserId,
  pub recipient_id: UserId,
  pub status:       RelationshipStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

impl RelationshipEdge {
  pub fn involves(&self, user: UserId) -> bool {
    self.initiator_id == user || self.recipient_id == user
  }

  /// The participant that is not `user`.
  pub fn counterpart(&self, user: UserId) -> UserId {
    if self.initiator_id == user { self.recipient_id } else { self.initiator_id }
  }
}

/// The single mutation a relationship action resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeChange {
  /// No edge exists; create one.
  Insert {
    initiator: UserId,
    recipient: UserId,
    status:    RelationshipStatus,
  },
  /// Change only the status of an existing edge.
  SetStatus { id: i64, status: RelationshipStatus },
  /// Rewrite direction and status of an existing edge.
  Reassign {
    id:        i64,
    initiator: UserId,
    recipient: UserId,
    status:    RelationshipStatus,
  },
  Delete { id: i64 },
}

/// Decide what `action` by `actor` against `target` does, given the edge
/// currently stored for the pair (in either direction).
pub fn plan_action(
  existing: Option<&RelationshipEdge>,
  actor: UserId,
  target: UserId,
  action: RelationshipAction,
) -> Result<EdgeChange> {
  use RelationshipAction as A;
  use RelationshipStatus as S;

  if actor == target {
    return Err(Error::SelfRelationship);
  }
  if let Some(edge) = existing {
    debug_assert!(edge.involves(actor) && edge.involves(target));
  }

  match (action, existing) {
    (A::Request, None) => Ok(EdgeChange::Insert {
      initiator: actor,
      recipient: target,
      status:    S::Pending,
    }),
    (A::Request, Some(edge)) => match edge.status {
      S::Accepted => Err(Error::AlreadyFriends(actor, target)),
      S::Pending => Err(Error::RequestAlreadyExists(actor, target)),
      S::Blocked => Err(Error::PairBlocked(actor, target)),
      S::Rejected => Ok(EdgeChange::Reassign {
        id:        edge.id,
        initiator: actor,
        recipient: target,
        status:    S::Pending,
      }),
    },

    (A::Accept | A::Reject, None) => Err(Error::EdgeNotFound(actor, target)),
    (A::Accept | A::Reject, Some(edge)) => {
      if edge.status != S::Pending {
        return Err(Error::NotPending);
      }
      if edge.recipient_id != actor {
        return Err(Error::NotRecipient);
      }
      let status = if action == A::Accept { S::Accepted } else { S::Rejected };
      Ok(EdgeChange::SetStatus { id: edge.id, status })
    }

    (A::Cancel, None) => Err(Error::EdgeNotFound(actor, target)),
    (A::Cancel, Some(edge)) => {
      if edge.status != S::Pending || edge.initiator_id != actor {
        return Err(Error::NotInitiator);
      }
      Ok(EdgeChange::Delete { id: edge.id })
    }

    (A::Unfriend, None) => Err(Error::NotFriends(actor, target)),
    (A::Unfriend, Some(edge)) => match edge.status {
      S::Accepted => Ok(EdgeChange::Delete { id: edge.id }),
      _ => Err(Error::NotFriends(actor, target)),
    },

    (A::Block, None) => Ok(EdgeChange::Insert {
      initiator: actor,
      recipient: target,
      status:    S::Blocked,
    }),
    (A::Block, Some(edge)) if edge.initiator_id == actor => {
      Ok(EdgeChange::SetStatus { id: edge.id, status: S::Blocked })
    }
    (A::Block, Some(edge)) => Ok(EdgeChange::Reassign {
      id:        edge.id,
      initiator: actor,
      recipient: target,
      status:    S::Blocked,
    }),

    (A::Unblock, None) => Err(Error::EdgeNotFound(actor, target)),
    (A::Unblock, Some(edge)) => {
      if edge.status != S::Blocked || edge.initiator_id != actor {
        return Err(Error::NotBlocker);
      }
      Ok(EdgeChange::Delete { id: edge.id })
    }
  }
}

/// The status `viewer` is allowed to see for the pair. A block placed by the
/// other side is reported as no relationship at all.
pub fn visible_status(
  edge: Option<&RelationshipEdge>,
  viewer: UserId,
) -> Option<RelationshipStatus> {
  let edge = edge?;
  if edge.status == RelationshipStatus::Blocked && edge.initiator_id != viewer {
    return None;
  }
  Some(edge.status)
}

/// Clamp a requested suggestion count: outside `1..=50` becomes 10.
pub fn suggestion_limit(requested: i64) -> usize {
  if (1..=MAX_SUGGESTION_LIMIT as i64).contains(&requested) {
    requested as usize
  } else {
    DEFAULT_SUGGESTION_LIMIT
  }
}

/// Draw up to `limit` candidates uniformly without replacement. The order of
/// the result carries no meaning.
pub fn sample_suggestions<R: Rng + ?Sized>(
  candidates: &[UserId],
  limit: usize,
  rng: &mut R,
) -> Vec<UserId> {
  candidates.choose_multiple(rng, limit).copied().collect()
}
