//! Identity lookups served to other plaza instances.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/internal/users/batch` | Body: `{"user_ids":[…]}`; unknown ids are omitted |
//! | `GET`  | `/internal/users/by-username/{username}` | 404 if not found |
//! | `PUT`  | `/internal/users/{id}/active` | Body: `{"is_active"}`; account state from the auth service |
//!
//! These routes carry no authentication and must only be reachable from
//! trusted services.

use axum::{
  Json,
  extract::{Path, State},
};
use plaza_core::{
  Error as CoreError, UserId,
  identity::{
    AccountState, BatchLookup, BatchLookupResponse, UserIdentity, UsernameLookup, dedup_ids,
  },
};

use crate::{AppState, Backend, error::ApiError};

/// Largest accepted batch.
pub const MAX_BATCH: usize = 500;

/// `POST /internal/users/batch`
pub async fn batch<S: Backend>(
  State(state): State<AppState<S>>,
  Json(body): Json<BatchLookup>,
) -> Result<Json<BatchLookupResponse>, ApiError> {
  let ids = dedup_ids(body.user_ids);
  if ids.len() > MAX_BATCH {
    return Err(ApiError::BadRequest(format!(
      "at most {MAX_BATCH} user ids per batch, got {}",
      ids.len()
    )));
  }
  let users = state.store.users_by_ids(ids).await.map_err(ApiError::store)?;
  tracing::debug!(resolved = users.len(), "served identity batch");
  Ok(Json(BatchLookupResponse { users: users.iter().map(|u| u.display()).collect() }))
}

/// `GET /internal/users/by-username/{username}`
pub async fn by_username<S: Backend>(
  State(state): State<AppState<S>>,
  Path(username): Path<String>,
) -> Result<Json<UsernameLookup>, ApiError> {
  let user = state
    .store
    .get_user_by_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::UserNotFound(username))?;
  Ok(Json(UsernameLookup { user_id: user.id }))
}

/// `PUT /internal/users/{id}/active`
///
/// Inactive users stay visible in lookups but are never suggested and cannot
/// receive new requests or blocks.
pub async fn set_active<S: Backend>(
  State(state): State<AppState<S>>,
  Path(id): Path<UserId>,
  Json(body): Json<AccountState>,
) -> Result<Json<UserIdentity>, ApiError> {
  let user = state
    .store
    .set_active(id, body.is_active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(user))
}
