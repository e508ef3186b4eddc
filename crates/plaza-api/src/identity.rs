//! Identity resolution for response assembly.
//!
//! [`IdentityBackend`] answers lookups either from the local identity store or
//! through a remote [`IdentityClient`]. [`decorate`] is what handlers call: a
//! failed lookup is logged and yields an empty map, so responses go out with
//! their display fields unset instead of failing.

use std::{collections::HashMap, sync::Arc};

use plaza_client::IdentityClient;
use plaza_core::{
  Classify, ErrorKind, UserId,
  identity::{DisplayIdentity, IdentityResolver, dedup_ids},
  store::IdentityStore,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("local identity lookup failed: {message}")]
  Local { kind: ErrorKind, message: String },

  #[error(transparent)]
  Remote(#[from] plaza_client::Error),
}

impl ResolveError {
  fn local<E: std::error::Error + Classify>(err: E) -> Self {
    ResolveError::Local { kind: err.kind(), message: err.to_string() }
  }
}

impl Classify for ResolveError {
  fn kind(&self) -> ErrorKind {
    match self {
      ResolveError::Local { kind, .. } => *kind,
      ResolveError::Remote(e) => e.kind(),
    }
  }
}

/// Where display identities come from.
pub enum IdentityBackend<S> {
  /// This process owns the identity store.
  Local(Arc<S>),
  /// Another plaza instance serves `/internal/users/*`.
  Remote(IdentityClient),
}

impl<S> IdentityBackend<S> {
  /// End the backend's lifecycle. Closes the remote client, if any.
  pub fn close(&self) {
    if let IdentityBackend::Remote(client) = self {
      client.close();
    }
  }
}

impl<S: IdentityStore> IdentityResolver for IdentityBackend<S> {
  type Error = ResolveError;

  async fn resolve_batch(
    &self,
    ids: Vec<UserId>,
  ) -> Result<HashMap<UserId, DisplayIdentity>, ResolveError> {
    match self {
      IdentityBackend::Local(store) => {
        let users = store
          .users_by_ids(dedup_ids(ids))
          .await
          .map_err(ResolveError::local)?;
        Ok(users.iter().map(|u| (u.id, u.display())).collect())
      }
      IdentityBackend::Remote(client) => Ok(client.resolve_batch(ids).await?),
    }
  }

  async fn resolve_username(&self, username: String) -> Result<Option<UserId>, ResolveError> {
    match self {
      IdentityBackend::Local(store) => {
        let user = store
          .get_user_by_username(username)
          .await
          .map_err(ResolveError::local)?;
        Ok(user.map(|u| u.id))
      }
      IdentityBackend::Remote(client) => Ok(client.resolve_username(username).await?),
    }
  }
}

/// Display identities for `ids`, or an empty map if the lookup failed.
pub async fn decorate<R: IdentityResolver>(
  resolver: &R,
  ids: impl IntoIterator<Item = UserId>,
) -> HashMap<UserId, DisplayIdentity> {
  let ids = dedup_ids(ids);
  if ids.is_empty() {
    return HashMap::new();
  }
  let requested = ids.len();
  match resolver.resolve_batch(ids).await {
    Ok(found) => found,
    Err(err) => {
      tracing::warn!(error = %err, requested, "identity lookup failed; responding undecorated");
      HashMap::new()
    }
  }
}
