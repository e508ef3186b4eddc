//! User identity and the batch identity-resolution contract.
//!
//! Display data (username, name, avatar) is owned by the identity store. Other
//! components hold only [`UserId`]s and ask an [`IdentityResolver`] for
//! display data when assembling responses.

use std::{
  collections::{BTreeSet, HashMap},
  future::Future,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, ids::UserId};

/// A user account as stored by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  pub id:           UserId,
  pub username:     String,
  pub display_name: String,
  pub avatar_url:   Option<String>,
  /// Inactive users are never suggested and cannot be targeted by new
  /// relationships.
  pub is_active:    bool,
  pub created_at:   DateTime<Utc>,
}

impl UserIdentity {
  pub fn display(&self) -> DisplayIdentity {
    DisplayIdentity {
      id:           self.id,
      username:     self.username.clone(),
      display_name: self.display_name.clone(),
      avatar_url:   self.avatar_url.clone(),
    }
  }
}

/// Input for creating a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
  pub username:     String,
  pub display_name: String,
  #[serde(default)]
  pub avatar_url:   Option<String>,
}

impl NewUser {
  /// Usernames are 3–20 characters of `[A-Za-z0-9_]`, stored lowercase.
  pub fn normalized(mut self) -> Result<Self> {
    self.username = self.username.trim().to_lowercase();
    let valid = (3..=20).contains(&self.username.len())
      && self
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
      return Err(Error::InvalidInput(format!(
        "username {:?} must be 3-20 characters of letters, digits or '_'",
        self.username
      )));
    }
    self.display_name = display_name(&self.display_name)?;
    self.avatar_url = self.avatar_url.as_deref().and_then(avatar_url);
    Ok(self)
  }
}

/// Changes to the caller's own profile. Absent fields are left alone; an
/// empty `avatar_url` clears the avatar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
  #[serde(default)]
  pub display_name: Option<String>,
  #[serde(default)]
  pub avatar_url:   Option<String>,
}

impl ProfilePatch {
  pub fn apply(self, user: &mut UserIdentity) -> Result<()> {
    if let Some(name) = self.display_name {
      user.display_name = display_name(&name)?;
    }
    if let Some(url) = self.avatar_url {
      user.avatar_url = avatar_url(&url);
    }
    Ok(())
  }
}

fn display_name(raw: &str) -> Result<String> {
  let name = raw.trim();
  if name.is_empty() || name.chars().count() > 100 {
    return Err(Error::InvalidInput("display name must be 1-100 characters".to_owned()));
  }
  Ok(name.to_owned())
}

fn avatar_url(raw: &str) -> Option<String> {
  let url = raw.trim();
  (!url.is_empty()).then(|| url.to_owned())
}

/// The subset of a user's identity attached to other entities in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayIdentity {
  pub id:           UserId,
  pub username:     String,
  pub display_name: String,
  pub avatar_url:   Option<String>,
}

/// Read-through batch lookup of display identities.
///
/// Implementations return a partial map: ids with no match are absent, never
/// an error. An `Err` means the whole lookup failed (transport, timeout).
pub trait IdentityResolver: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn resolve_batch(
    &self,
    ids: Vec<UserId>,
  ) -> impl Future<Output = Result<HashMap<UserId, DisplayIdentity>, Self::Error>> + Send + '_;

  fn resolve_username(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<UserId>, Self::Error>> + Send + '_;
}

// ─── Wire contract ───────────────────────────────────────────────────────────

/// Body of `POST /internal/users/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLookup {
  pub user_ids: Vec<UserId>,
}

/// Response of `POST /internal/users/batch`: the resolvable subset, in no
/// particular order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchLookupResponse {
  pub users: Vec<DisplayIdentity>,
}

/// Response of `GET /internal/users/by-username/{username}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsernameLookup {
  pub user_id: UserId,
}

/// Body of `PUT /internal/users/{id}/active`, sent by the authentication
/// service when an account is suspended or restored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccountState {
  pub is_active: bool,
}

/// Deduplicate ids, returning them in ascending order.
pub fn dedup_ids(ids: impl IntoIterator<Item = UserId>) -> Vec<UserId> {
  ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}
