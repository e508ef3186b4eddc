//! Handlers for `/friends` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/friends/{action}` | `request\|accept\|reject\|cancel\|unfriend\|block\|unblock`; body `{"friend_id"}` |
//! | `GET`  | `/friends` | Accepted friends with mutual counts, paged |
//! | `GET`  | `/friends/user/{username}` | Another user's friends; mutual counts are relative to the caller |
//! | `GET`  | `/friends/requests` | `?direction=incoming\|outgoing`, paged |
//! | `GET`  | `/friends/suggestions` | `?limit=` (1-50, default 10) |
//! | `GET`  | `/friends/status/{username}` | `none` when there is no visible edge |
//! | `GET`  | `/friends/mutual/{username}` | |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use plaza_core::{
  Error as CoreError, UserId,
  identity::{DisplayIdentity, IdentityResolver as _},
  page::Paged,
  relationship::{
    RelationshipAction, RelationshipEdge, RelationshipStatus, RequestDirection,
    sample_suggestions, suggestion_limit, visible_status,
  },
};
use serde::{Deserialize, Serialize};

use super::PageParams;
use crate::{AppState, Backend, CurrentUser, error::ApiError, identity::decorate};

// ─── Views ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ActionResult {
  pub action:       RelationshipAction,
  pub friend_id:    UserId,
  /// The edge after the action; `null` when the action removed it.
  pub relationship: Option<RelationshipEdge>,
}

#[derive(Debug, Serialize)]
pub struct FriendView {
  pub user_id:        UserId,
  pub user:           Option<DisplayIdentity>,
  pub since:          DateTime<Utc>,
  pub mutual_friends: u64,
}

#[derive(Debug, Serialize)]
pub struct RequestView {
  pub id:         i64,
  /// The other party: the sender for incoming requests, the recipient for
  /// outgoing ones.
  pub user_id:    UserId,
  pub user:       Option<DisplayIdentity>,
  pub status:     RelationshipStatus,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionView {
  pub user_id:        UserId,
  pub user:           Option<DisplayIdentity>,
  pub mutual_friends: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
  pub user_id: UserId,
  pub status:  String,
}

#[derive(Debug, Serialize)]
pub struct MutualView {
  pub user_id:        UserId,
  pub mutual_friends: u64,
}

async fn resolve<S: Backend>(state: &AppState<S>, username: String) -> Result<UserId, ApiError> {
  let id = state
    .identity
    .resolve_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::UserNotFound(username))?;
  Ok(id)
}

// ─── Actions ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActionBody {
  pub friend_id: UserId,
}

/// `POST /friends/{action}`
pub async fn perform<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(action): Path<String>,
  Json(body): Json<ActionBody>,
) -> Result<Json<ActionResult>, ApiError> {
  let action: RelationshipAction = action
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("unknown relationship action {action:?}")))?;

  let relationship = state
    .store
    .perform_action(me, body.friend_id, action)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ActionResult { action, friend_id: body.friend_id, relationship }))
}

// ─── Lists ────────────────────────────────────────────────────────────────────

/// Accepted friends of `owner`, with mutual counts between `viewer` and each
/// friend.
async fn friend_page<S: Backend>(
  state: &AppState<S>,
  owner: UserId,
  viewer: UserId,
  page: PageParams,
) -> Result<Paged<FriendView>, ApiError> {
  let edges = state
    .store
    .list_accepted(owner, page.request())
    .await
    .map_err(ApiError::store)?;

  let mut mutual = Vec::with_capacity(edges.items.len());
  for edge in &edges.items {
    let friend = edge.counterpart(owner);
    let count = if friend == viewer {
      0
    } else {
      state.store.mutual_count(viewer, friend).await.map_err(ApiError::store)?
    };
    mutual.push(count);
  }

  let users = decorate(&*state.identity, edges.items.iter().map(|e| e.counterpart(owner))).await;
  let mut mutual = mutual.into_iter();
  Ok(edges.map(|edge| {
    let user_id = edge.counterpart(owner);
    FriendView {
      user_id,
      user: users.get(&user_id).cloned(),
      since: edge.updated_at,
      mutual_friends: mutual.next().unwrap_or_default(),
    }
  }))
}

/// `GET /friends`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<FriendView>>, ApiError> {
  friend_page(&state, me, me, page).await.map(Json)
}

/// `GET /friends/user/{username}`
pub async fn of_user<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(username): Path<String>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<FriendView>>, ApiError> {
  let owner = resolve(&state, username).await?;
  friend_page(&state, owner, me, page).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestParams {
  #[serde(default)]
  pub direction: RequestDirection,
}

/// `GET /friends/requests[?direction=incoming|outgoing]`
pub async fn requests<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Query(params): Query<RequestParams>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<RequestView>>, ApiError> {
  let edges = state
    .store
    .list_pending(me, params.direction, page.request())
    .await
    .map_err(ApiError::store)?;

  let users = decorate(&*state.identity, edges.items.iter().map(|e| e.counterpart(me))).await;
  Ok(Json(edges.map(|edge| {
    let user_id = edge.counterpart(me);
    RequestView {
      id: edge.id,
      user_id,
      user: users.get(&user_id).cloned(),
      status: edge.status,
      created_at: edge.created_at,
    }
  })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionParams {
  pub limit: Option<i64>,
}

/// `GET /friends/suggestions[?limit=]`
///
/// The result is a uniform sample of eligible users; its order carries no
/// meaning.
pub async fn suggestions<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Query(params): Query<SuggestionParams>,
) -> Result<Json<Vec<SuggestionView>>, ApiError> {
  let candidates = state
    .store
    .suggestion_candidates(me)
    .await
    .map_err(ApiError::store)?;
  let limit = suggestion_limit(params.limit.unwrap_or_default());
  let picked = sample_suggestions(&candidates, limit, &mut rand::thread_rng());

  let users = decorate(&*state.identity, picked.iter().copied()).await;
  let mut views = Vec::with_capacity(picked.len());
  for user_id in picked {
    let mutual_friends = state
      .store
      .mutual_count(me, user_id)
      .await
      .map_err(ApiError::store)?;
    views.push(SuggestionView { user_id, user: users.get(&user_id).cloned(), mutual_friends });
  }
  Ok(Json(views))
}

// ─── Lookups ──────────────────────────────────────────────────────────────────

/// `GET /friends/status/{username}`
pub async fn status<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(username): Path<String>,
) -> Result<Json<StatusView>, ApiError> {
  let other = resolve(&state, username).await?;
  let edge = state
    .store
    .edge_between(me, other)
    .await
    .map_err(ApiError::store)?;
  let status = visible_status(edge.as_ref(), me)
    .map(|s| s.as_ref().to_owned())
    .unwrap_or_else(|| "none".to_owned());
  Ok(Json(StatusView { user_id: other, status }))
}

/// `GET /friends/mutual/{username}`
pub async fn mutual<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(username): Path<String>,
) -> Result<Json<MutualView>, ApiError> {
  let other = resolve(&state, username).await?;
  let mutual_friends = state
    .store
    .mutual_count(me, other)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(MutualView { user_id: other, mutual_friends }))
}
