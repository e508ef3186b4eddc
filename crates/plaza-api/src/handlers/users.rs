//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Body: `{"username","display_name","avatar_url"?}` |
//! | `GET`  | `/users` | All users in id order, paged |
//! | `GET`  | `/users/me` | Requires a token |
//! | `PUT`  | `/users/me` | Body: `{"display_name"?,"avatar_url"?}` |
//! | `GET`  | `/users/{username}` | 404 if not found; `friendship_status` when a token is sent |
//! | `GET`  | `/users/{username}/posts` | Ranked author feed, same query as `/posts/feed` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use plaza_core::{
  Error as CoreError,
  feed::{ContentFilter, FeedPage},
  identity::{IdentityResolver as _, NewUser, ProfilePatch, UserIdentity},
  page::Paged,
  relationship::visible_status,
};
use serde::Serialize;

use super::{
  PageParams,
  posts::{FeedParams, PostView, ranked},
};
use crate::{AppState, Backend, CurrentUser, MaybeUser, error::ApiError};

/// `POST /users`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
  let user = state.store.create_user(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users[?page=&page_size=]`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<UserIdentity>>, ApiError> {
  let users = state.store.list_users(page.request()).await.map_err(ApiError::store)?;
  Ok(Json(users))
}

/// `GET /users/me`
pub async fn me<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
) -> Result<Json<UserIdentity>, ApiError> {
  let user = state
    .store
    .get_user(me)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| CoreError::UserNotFound(me.to_string()))?;
  Ok(Json(user))
}

/// `PUT /users/me`
pub async fn update_me<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Json(body): Json<ProfilePatch>,
) -> Result<Json<UserIdentity>, ApiError> {
  let user = state.store.update_profile(me, body).await.map_err(ApiError::store)?;
  Ok(Json(user))
}

/// A profile as seen by another user.
#[derive(Debug, Serialize)]
pub struct ProfileView {
  #[serde(flatten)]
  pub user:              UserIdentity,
  pub friend_count:      u64,
  /// `self`, a relationship status, or `none`. Absent for anonymous viewers.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub friendship_status: Option<String>,
}

/// `GET /users/{username}`
pub async fn by_username<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(username): Path<String>,
) -> Result<Json<ProfileView>, ApiError> {
  let user = state
    .store
    .get_user_by_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::UserNotFound(username))?;
  let friend_count = state.store.friend_count(user.id).await.map_err(ApiError::store)?;

  let friendship_status = match viewer {
    None => None,
    Some(me) if me == user.id => Some("self".to_owned()),
    Some(me) => {
      let edge = state.store.edge_between(me, user.id).await.map_err(ApiError::store)?;
      let status = visible_status(edge.as_ref(), me)
        .map_or_else(|| "none".to_owned(), |s| s.as_ref().to_owned());
      Some(status)
    }
  };
  Ok(Json(ProfileView { user, friend_count, friendship_status }))
}

/// `GET /users/{username}/posts[?mode=&limit=&offset=]`
pub async fn posts<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(username): Path<String>,
  Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage<PostView>>, ApiError> {
  let author = state
    .identity
    .resolve_username(username.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::UserNotFound(username))?;

  let filter = ContentFilter { viewer, author: Some(author), since: None };
  ranked(&state, filter, &params).await.map(Json)
}
