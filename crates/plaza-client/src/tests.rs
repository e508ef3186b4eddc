use std::{collections::HashMap, time::Duration};

use axum::{
  Json, Router,
  extract::Path,
  http::StatusCode,
  routing::{get, post},
};
use plaza_core::{
  Classify as _, ErrorKind, UserId,
  identity::{BatchLookup, BatchLookupResponse, DisplayIdentity, IdentityResolver, UsernameLookup},
};
use tokio::net::TcpListener;

use crate::{Error, IdentityClient};

fn person(id: i64, username: &str) -> DisplayIdentity {
  DisplayIdentity {
    id:           UserId(id),
    username:     username.to_owned(),
    display_name: username.to_uppercase(),
    avatar_url:   None,
  }
}

/// Users 1 and 3 exist; 2 does not.
fn directory() -> HashMap<UserId, DisplayIdentity> {
  [person(1, "alice"), person(3, "carol")]
    .into_iter()
    .map(|p| (p.id, p))
    .collect()
}

async fn batch(Json(body): Json<BatchLookup>) -> Json<BatchLookupResponse> {
  let dir = directory();
  let users = body.user_ids.iter().filter_map(|id| dir.get(id).cloned()).collect();
  Json(BatchLookupResponse { users })
}

async fn by_username(Path(name): Path<String>) -> Result<Json<UsernameLookup>, StatusCode> {
  directory()
    .into_values()
    .find(|p| p.username == name)
    .map(|p| Json(UsernameLookup { user_id: p.id }))
    .ok_or(StatusCode::NOT_FOUND)
}

async fn serve(router: Router) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
  format!("http://{addr}")
}

async fn directory_service() -> String {
  serve(
    Router::new()
      .route("/internal/users/batch", post(batch))
      .route("/internal/users/by-username/{username}", get(by_username)),
  )
  .await
}

#[tokio::test]
async fn batch_returns_only_existing_ids() {
  let client = IdentityClient::new(&directory_service().await).unwrap();

  let found = client
    .resolve_batch(vec![UserId(1), UserId(2), UserId(3), UserId(1)])
    .await
    .unwrap();

  assert_eq!(found.len(), 2);
  assert_eq!(found[&UserId(1)].username, "alice");
  assert_eq!(found[&UserId(3)].username, "carol");
  assert!(!found.contains_key(&UserId(2)));
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
  // Nothing listens on this base; an actual request would fail.
  let client = IdentityClient::connect("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
  assert!(client.resolve_batch(vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn username_lookup_maps_404_to_none() {
  let client = IdentityClient::new(&directory_service().await).unwrap();
  assert_eq!(client.resolve_username("carol".into()).await.unwrap(), Some(UserId(3)));
  assert_eq!(client.resolve_username("bob".into()).await.unwrap(), None);
}

#[tokio::test]
async fn base_path_is_preserved() {
  let base = serve(Router::new().nest(
    "/identity",
    Router::new().route("/internal/users/batch", post(batch)),
  ))
  .await;
  let client = IdentityClient::new(&format!("{base}/identity/")).unwrap();
  let found = client.resolve_batch(vec![UserId(1)]).await.unwrap();
  assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn slow_service_times_out_as_upstream_error() {
  let base = serve(Router::new().route(
    "/internal/users/batch",
    post(|| async {
      tokio::time::sleep(Duration::from_secs(2)).await;
      Json(BatchLookupResponse::default())
    }),
  ))
  .await;
  let client = IdentityClient::connect(&base, Duration::from_millis(100)).unwrap();

  let err = client.resolve_batch(vec![UserId(1)]).await.unwrap_err();
  assert!(matches!(err, Error::Request { .. }));
  assert_eq!(err.kind(), ErrorKind::Upstream);
}

#[tokio::test]
async fn server_error_status_is_reported() {
  let base = serve(Router::new().route(
    "/internal/users/batch",
    post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
  ))
  .await;
  let client = IdentityClient::new(&base).unwrap();

  let err = client.resolve_batch(vec![UserId(1)]).await.unwrap_err();
  assert!(matches!(err, Error::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
}

#[tokio::test]
async fn closed_client_refuses_lookups() {
  let client = IdentityClient::new(&directory_service().await).unwrap();
  client.close();
  client.close();
  assert!(client.is_closed());
  assert!(matches!(client.resolve_batch(vec![UserId(1)]).await, Err(Error::Closed)));
  assert!(matches!(client.resolve_username("alice".into()).await, Err(Error::Closed)));
}

#[test]
fn rejects_unusable_base_url() {
  assert!(matches!(IdentityClient::new("not a url"), Err(Error::InvalidUrl(_))));
  assert!(matches!(IdentityClient::new("mailto:someone@example.com"), Err(Error::InvalidUrl(_))));
}
