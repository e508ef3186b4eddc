//! Handlers for `/groups` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/groups` | Public groups, newest first |
//! | `POST`   | `/groups` | Body: `{"name","description"?,"privacy"?,…}` |
//! | `GET`    | `/groups/me` | Groups the caller is an approved member of |
//! | `GET`    | `/groups/{id}` | Private groups require membership |
//! | `PUT`    | `/groups/{id}` | Admin only |
//! | `DELETE` | `/groups/{id}` | Creator or admin |
//! | `POST`   | `/groups/{id}/join` | Body: `{"nickname"?}` |
//! | `POST`   | `/groups/{id}/leave` | |
//! | `POST`   | `/groups/{id}/invite` | Body: `{"user_id"}`, admin only |
//! | `GET`    | `/groups/{id}/members` | `?role=&status=&page=&page_size=` |
//! | `POST`   | `/groups/{id}/members/{approve\|reject}` | Body: `{"user_id"}` |
//! | `PUT`    | `/groups/{id}/members/{member_id}` | Body: `{"nickname"?,"role"?,"is_muted"?}` |
//! | `DELETE` | `/groups/{id}/members/{user_id}` | Admin only |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use plaza_core::{
  GroupId, UserId,
  group::{
    GroupEntity, GroupPatch, GroupView, JoinDecision, MemberFilter, MemberPatch, MembershipEdge,
    NewGroup,
  },
  identity::DisplayIdentity,
  page::Paged,
};
use serde::{Deserialize, Serialize};

use super::PageParams;
use crate::{AppState, Backend, CurrentUser, MaybeUser, error::ApiError, identity::decorate};

#[derive(Debug, Serialize)]
pub struct MemberView {
  #[serde(flatten)]
  pub membership: MembershipEdge,
  pub user:       Option<DisplayIdentity>,
}

#[derive(Debug, Deserialize)]
pub struct TargetBody {
  pub user_id: UserId,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinBody {
  #[serde(default)]
  pub nickname: Option<String>,
}

fn parse_segment<T: std::str::FromStr>(segment: &str, what: &str) -> Result<T, ApiError> {
  segment
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("invalid {what} {segment:?}")))
}

// ─── Groups ───────────────────────────────────────────────────────────────────

/// `GET /groups`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<GroupEntity>>, ApiError> {
  state
    .store
    .list_groups(page.request())
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `POST /groups`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Json(body): Json<NewGroup>,
) -> Result<impl IntoResponse, ApiError> {
  let (group, membership) = state
    .store
    .create_group(me, body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(GroupView { group, membership: Some(membership) })))
}

/// `GET /groups/me`
pub async fn mine<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<GroupEntity>>, ApiError> {
  state
    .store
    .list_user_groups(me, page.request())
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `GET /groups/{id}`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(id): Path<GroupId>,
) -> Result<Json<GroupView>, ApiError> {
  state
    .store
    .view_group(viewer, id)
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `PUT /groups/{id}`
pub async fn update<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<GroupId>,
  Json(patch): Json<GroupPatch>,
) -> Result<Json<GroupEntity>, ApiError> {
  state
    .store
    .update_group(me, id, patch)
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `DELETE /groups/{id}`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<GroupId>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_group(me, id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Membership ───────────────────────────────────────────────────────────────

/// `POST /groups/{id}/join`
pub async fn join<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<GroupId>,
  Json(body): Json<JoinBody>,
) -> Result<impl IntoResponse, ApiError> {
  let membership = state
    .store
    .join(me, id, body.nickname)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(membership)))
}

/// `POST /groups/{id}/leave`
pub async fn leave<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<GroupId>,
) -> Result<StatusCode, ApiError> {
  state.store.leave(me, id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /groups/{id}/invite`
pub async fn invite<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<GroupId>,
  Json(body): Json<TargetBody>,
) -> Result<impl IntoResponse, ApiError> {
  let membership = state
    .store
    .invite(me, id, body.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(membership)))
}

/// `POST /groups/{id}/members/{approve|reject}`
pub async fn review<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path((id, decision)): Path<(GroupId, String)>,
  Json(body): Json<TargetBody>,
) -> Result<Json<MembershipEdge>, ApiError> {
  let decision: JoinDecision = parse_segment(&decision, "decision")?;
  state
    .store
    .review_join(me, id, body.user_id, decision)
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `GET /groups/{id}/members`
pub async fn members<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(id): Path<GroupId>,
  Query(filter): Query<MemberFilter>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<MemberView>>, ApiError> {
  let members = state
    .store
    .list_members(viewer, id, filter, page.request())
    .await
    .map_err(ApiError::store)?;

  let users = decorate(&*state.identity, members.items.iter().map(|m| m.user_id)).await;
  Ok(Json(members.map(|membership| MemberView {
    user: users.get(&membership.user_id).cloned(),
    membership,
  })))
}

/// `PUT /groups/{id}/members/{member_id}`
pub async fn update_member<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path((id, member)): Path<(GroupId, String)>,
  Json(patch): Json<MemberPatch>,
) -> Result<Json<MembershipEdge>, ApiError> {
  let member_id: i64 = parse_segment(&member, "member id")?;
  state
    .store
    .update_member(me, id, member_id, patch)
    .await
    .map(Json)
    .map_err(ApiError::store)
}

/// `DELETE /groups/{id}/members/{user_id}`
pub async fn remove_member<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path((id, member)): Path<(GroupId, String)>,
) -> Result<StatusCode, ApiError> {
  let user: UserId = parse_segment(&member, "user id")?;
  state
    .store
    .remove_member(me, id, user)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
