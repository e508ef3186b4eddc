//! Handlers for `/posts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/posts` | Body: `{"content","visibility"?}` |
//! | `GET`    | `/posts/feed` | `?mode=latest\|popular_today\|…&limit=&offset=` |
//! | `GET`    | `/posts/{id}` | Hidden posts are 404 |
//! | `DELETE` | `/posts/{id}` | Author only |
//! | `POST`   | `/posts/{id}/like` | Idempotent |
//! | `DELETE` | `/posts/{id}/like` | |
//! | `GET`    | `/posts/{id}/comments` | Oldest first, paged |
//! | `POST`   | `/posts/{id}/comments` | Body: `{"content"}` |
//! | `POST`   | `/posts/{id}/shares` | |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use plaza_core::{
  PostId,
  feed::{
    Comment, ContentFilter, ContentItem, DEFAULT_FEED_LIMIT, Engagement, FeedMode, FeedPage,
    NewComment, NewPost, clamp_window, rank,
  },
  identity::DisplayIdentity,
  page::Paged,
};
use serde::{Deserialize, Serialize};

use super::PageParams;
use crate::{AppState, Backend, CurrentUser, MaybeUser, error::ApiError, identity::decorate};

// ─── Views ────────────────────────────────────────────────────────────────────

/// A post with its score and, when resolvable, its author.
#[derive(Debug, Serialize)]
pub struct PostView {
  #[serde(flatten)]
  pub post:   ContentItem,
  pub score:  u64,
  pub author: Option<DisplayIdentity>,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
  #[serde(flatten)]
  pub comment: Comment,
  pub author:  Option<DisplayIdentity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
  #[serde(default)]
  pub mode:   FeedMode,
  pub limit:  Option<i64>,
  pub offset: Option<i64>,
}

/// Fetch and decorate one page of a feed. Recency modes are paginated by the
/// store; score modes rank a windowed snapshot.
pub(crate) async fn ranked<S: Backend>(
  state: &AppState<S>,
  mut filter: ContentFilter,
  params: &FeedParams,
) -> Result<FeedPage<PostView>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_FEED_LIMIT as i64);
  let offset = params.offset.unwrap_or(0);

  let page = if params.mode.by_score() {
    let now = Utc::now();
    filter.since = params.mode.window_start(now);
    let items = state
      .store
      .content_snapshot(filter)
      .await
      .map_err(ApiError::store)?;
    rank(items, params.mode, limit, offset, now)
  } else {
    let (limit, offset) = clamp_window(limit, offset);
    state
      .store
      .recent_page(filter, limit, offset)
      .await
      .map_err(ApiError::store)?
  };

  let authors = decorate(&*state.identity, page.items.iter().map(|p| p.author_id)).await;
  Ok(page.map(|post| PostView {
    score:  post.engagement.score(),
    author: authors.get(&post.author_id).cloned(),
    post,
  }))
}

async fn view<S: Backend>(state: &AppState<S>, post: ContentItem) -> PostView {
  let mut authors = decorate(&*state.identity, [post.author_id]).await;
  PostView {
    score:  post.engagement.score(),
    author: authors.remove(&post.author_id),
    post,
  }
}

// ─── Posts ────────────────────────────────────────────────────────────────────

/// `POST /posts`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Json(body): Json<NewPost>,
) -> Result<impl IntoResponse, ApiError> {
  let post = state.store.create_post(me, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(view(&state, post).await)))
}

/// `GET /posts/feed`
pub async fn feed<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage<PostView>>, ApiError> {
  let filter = ContentFilter { viewer, ..ContentFilter::default() };
  ranked(&state, filter, &params).await.map(Json)
}

/// `GET /posts/{id}`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(id): Path<PostId>,
) -> Result<Json<PostView>, ApiError> {
  let post = state.store.get_post(viewer, id).await.map_err(ApiError::store)?;
  Ok(Json(view(&state, post).await))
}

/// `DELETE /posts/{id}`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<PostId>,
) -> Result<StatusCode, ApiError> {
  state.store.delete_post(me, id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Engagement ───────────────────────────────────────────────────────────────

/// `POST /posts/{id}/like`
pub async fn like<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<PostId>,
) -> Result<Json<Engagement>, ApiError> {
  state.store.like(me, id).await.map(Json).map_err(ApiError::store)
}

/// `DELETE /posts/{id}/like`
pub async fn unlike<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<PostId>,
) -> Result<Json<Engagement>, ApiError> {
  state.store.unlike(me, id).await.map(Json).map_err(ApiError::store)
}

/// `POST /posts/{id}/shares`
pub async fn share<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<PostId>,
) -> Result<impl IntoResponse, ApiError> {
  let engagement = state.store.share(me, id).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(engagement)))
}

// ─── Comments ─────────────────────────────────────────────────────────────────

/// `GET /posts/{id}/comments`
pub async fn comments<S: Backend>(
  State(state): State<AppState<S>>,
  MaybeUser(viewer): MaybeUser,
  Path(id): Path<PostId>,
  Query(page): Query<PageParams>,
) -> Result<Json<Paged<CommentView>>, ApiError> {
  let comments = state
    .store
    .list_comments(viewer, id, page.request())
    .await
    .map_err(ApiError::store)?;

  let authors = decorate(&*state.identity, comments.items.iter().map(|c| c.author_id)).await;
  Ok(Json(comments.map(|comment| CommentView {
    author: authors.get(&comment.author_id).cloned(),
    comment,
  })))
}

/// `POST /posts/{id}/comments`
pub async fn comment<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentUser(me): CurrentUser,
  Path(id): Path<PostId>,
  Json(body): Json<NewComment>,
) -> Result<impl IntoResponse, ApiError> {
  let comment = state
    .store
    .add_comment(me, id, body)
    .await
    .map_err(ApiError::store)?;
  let mut authors = decorate(&*state.identity, [me]).await;
  let view = CommentView { author: authors.remove(&me), comment };
  Ok((StatusCode::CREATED, Json(view)))
}
