//! JSON REST API for Plaza.
//!
//! Exposes an axum [`Router`] backed by any store implementing the
//! relationship, group and content ledgers. Callers are authenticated with
//! bearer JWTs (see [`auth`]); display identities are attached to responses
//! through an [`IdentityBackend`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod identity;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use plaza_core::store::{ContentStore, GroupStore, RelationshipStore};
use tower_http::trace::TraceLayer;

pub use auth::{CurrentUser, JwtVerifier, MaybeUser};
pub use error::ApiError;
pub use identity::IdentityBackend;

use handlers::{friends, groups, internal, posts, users};

/// Everything a handler may need from storage.
pub trait Backend: RelationshipStore + GroupStore + ContentStore + 'static {}

impl<T> Backend for T where T: RelationshipStore + GroupStore + ContentStore + 'static {}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub identity: Arc<IdentityBackend<S>>,
  pub auth:     Arc<JwtVerifier>,
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>, identity: IdentityBackend<S>, auth: JwtVerifier) -> Self {
    Self { store, identity: Arc::new(identity), auth: Arc::new(auth) }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      identity: Arc::clone(&self.identity),
      auth:     Arc::clone(&self.auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router. Every request is traced.
pub fn router<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    // Users
    .route("/users", get(users::list::<S>).post(users::create::<S>))
    .route("/users/me", get(users::me::<S>).put(users::update_me::<S>))
    .route("/users/{username}", get(users::by_username::<S>))
    .route("/users/{username}/posts", get(users::posts::<S>))
    // Identity lookups for other instances
    .route("/internal/users/batch", post(internal::batch::<S>))
    .route("/internal/users/by-username/{username}", get(internal::by_username::<S>))
    .route("/internal/users/{id}/active", put(internal::set_active::<S>))
    // Friends
    .route("/friends", get(friends::list::<S>))
    .route("/friends/user/{username}", get(friends::of_user::<S>))
    .route("/friends/requests", get(friends::requests::<S>))
    .route("/friends/suggestions", get(friends::suggestions::<S>))
    .route("/friends/status/{username}", get(friends::status::<S>))
    .route("/friends/mutual/{username}", get(friends::mutual::<S>))
    .route("/friends/{action}", post(friends::perform::<S>))
    // Groups
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/groups/me", get(groups::mine::<S>))
    .route(
      "/groups/{id}",
      get(groups::get_one::<S>)
        .put(groups::update::<S>)
        .delete(groups::delete_one::<S>),
    )
    .route("/groups/{id}/join", post(groups::join::<S>))
    .route("/groups/{id}/leave", post(groups::leave::<S>))
    .route("/groups/{id}/invite", post(groups::invite::<S>))
    .route("/groups/{id}/members", get(groups::members::<S>))
    .route(
      "/groups/{id}/members/{member}",
      post(groups::review::<S>)
        .put(groups::update_member::<S>)
        .delete(groups::remove_member::<S>),
    )
    // Posts
    .route("/posts", post(posts::create::<S>))
    .route("/posts/feed", get(posts::feed::<S>))
    .route("/posts/{id}", get(posts::get_one::<S>).delete(posts::delete_one::<S>))
    .route("/posts/{id}/like", post(posts::like::<S>).delete(posts::unlike::<S>))
    .route(
      "/posts/{id}/comments",
      get(posts::comments::<S>).post(posts::comment::<S>),
    )
    .route("/posts/{id}/shares", post(posts::share::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
