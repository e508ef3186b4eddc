//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use chrono::Duration;
use plaza_client::IdentityClient;
use plaza_core::UserId;
use plaza_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, IdentityBackend, JwtVerifier, router};

const SECRET: &str = "router-test-secret";

struct TestApp {
  router: Router,
  state:  AppState<SqliteStore>,
}

impl TestApp {
  async fn new() -> Self {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    Self::with_identity(store.clone(), IdentityBackend::Local(store))
  }

  /// Identity lookups go to a client that is already closed, so every
  /// lookup fails.
  async fn with_broken_identity() -> Self {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let client = IdentityClient::new("http://127.0.0.1:9").unwrap();
    client.close();
    Self::with_identity(store, IdentityBackend::Remote(client))
  }

  fn with_identity(store: Arc<SqliteStore>, identity: IdentityBackend<SqliteStore>) -> Self {
    let state = AppState::new(store, identity, JwtVerifier::new(SECRET, None));
    Self { router: router(state.clone()), state }
  }

  fn token(&self, user: UserId) -> String {
    self.state.auth.issue(user, Duration::hours(1)).unwrap()
  }

  async fn call(
    &self,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(body) => req
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => req.body(Body::empty()).unwrap(),
    };

    let resp = self.router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  /// Create a user and return their id and a token for them.
  async fn user(&self, username: &str) -> (UserId, String) {
    let (status, body) = self
      .call(
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": username, "display_name": username.to_uppercase() })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = UserId(body["id"].as_i64().unwrap());
    (id, self.token(id))
  }

  /// `from` sends a friend request that `to` accepts.
  async fn befriend(&self, from: (UserId, &str), to: (UserId, &str)) {
    let (status, _) = self
      .call(Method::POST, "/friends/request", Some(from.1), Some(json!({ "friend_id": to.0 })))
      .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = self
      .call(Method::POST, "/friends/accept", Some(to.1), Some(json!({ "friend_id": from.0 })))
      .await;
    assert_eq!(status, StatusCode::OK);
  }
}

// ─── Basics ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health() {
  let app = TestApp::new().await;
  let (status, body) = app.call(Method::GET, "/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
  let app = TestApp::new().await;
  let (status, body) = app.call(Method::GET, "/users/me", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], "unauthorized");

  let (status, _) = app.call(Method::GET, "/friends", Some("not-a-jwt"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profiles() {
  let app = TestApp::new().await;
  let (alice, token) = app.user("alice").await;

  let (status, body) = app.call(Method::GET, "/users/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["id"], alice.get());

  let (status, body) = app.call(Method::GET, "/users/ALICE", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["display_name"], "ALICE");

  let (status, body) = app
    .call(Method::POST, "/users", None, Some(json!({ "username": "alice", "display_name": "A" })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "conflict");

  let (status, _) = app.call(Method::GET, "/users/nobody", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_editing_and_user_listing() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;
  app.user("bob").await;
  app.user("carol").await;

  let (status, body) = app
    .call(
      Method::PUT,
      "/users/me",
      Some(&ta),
      Some(json!({ "display_name": "  Alice Liddell ", "avatar_url": "https://img/a.png" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["id"], alice.get());
  assert_eq!(body["username"], "alice");
  assert_eq!(body["display_name"], "Alice Liddell");

  let (_, body) = app.call(Method::GET, "/users/me", Some(&ta), None).await;
  assert_eq!(body["avatar_url"], "https://img/a.png");

  let (status, body) = app
    .call(Method::PUT, "/users/me", Some(&ta), Some(json!({ "display_name": " " })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "invalid_input");

  let (status, _) = app
    .call(Method::PUT, "/users/me", None, Some(json!({ "display_name": "x" })))
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, body) = app.call(Method::GET, "/users?page=2&page_size=2", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["total"], 3);
  assert_eq!(body["total_pages"], 2);
  assert_eq!(body["items"][0]["username"], "carol");

  let (_, body) = app.call(Method::GET, "/users?page=0&page_size=500", None, None).await;
  assert_eq!(body["page"], 1);
  assert_eq!(body["page_size"], 10);
  assert_eq!(body["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn profiles_carry_friend_count_and_status() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;
  let (carol, tc) = app.user("carol").await;
  app.befriend((alice, &ta), (bob, &tb)).await;

  let (status, body) = app.call(Method::GET, "/users/bob", Some(&ta), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["username"], "bob");
  assert_eq!(body["friend_count"], 1);
  assert_eq!(body["friendship_status"], "accepted");

  let (_, body) = app.call(Method::GET, "/users/alice", Some(&ta), None).await;
  assert_eq!(body["friendship_status"], "self");

  let (_, body) = app.call(Method::GET, "/users/alice", Some(&tc), None).await;
  assert_eq!(body["friendship_status"], "none");
  assert_eq!(body["friend_count"], 1);

  // Anonymous viewers get no status at all.
  let (_, body) = app.call(Method::GET, "/users/alice", None, None).await;
  assert!(body.get("friendship_status").is_none());
  assert_eq!(body["friend_count"], 1);

  // A block shows only on the blocker's side.
  app
    .call(Method::POST, "/friends/block", Some(&ta), Some(json!({ "friend_id": carol })))
    .await;
  let (_, body) = app.call(Method::GET, "/users/carol", Some(&ta), None).await;
  assert_eq!(body["friendship_status"], "blocked");
  let (_, body) = app.call(Method::GET, "/users/alice", Some(&tc), None).await;
  assert_eq!(body["friendship_status"], "none");
}

// ─── Friends ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn friends_of_another_user() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;
  let (carol, tc) = app.user("carol").await;
  let (_, td) = app.user("dave").await;
  app.befriend((alice, &ta), (bob, &tb)).await;
  app.befriend((alice, &ta), (carol, &tc)).await;
  app.befriend((bob, &tb), (carol, &tc)).await;
  // Pending requests are not listed.
  app
    .call(Method::POST, "/friends/request", Some(&td), Some(json!({ "friend_id": alice })))
    .await;

  let (status, body) = app.call(Method::GET, "/friends/user/alice", Some(&tb), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["total"], 2);
  let items = body["items"].as_array().unwrap();
  let view_of = |id: UserId| items.iter().find(|f| f["user_id"] == id.get()).unwrap();
  // Counts are relative to the caller: bob and carol share alice.
  assert_eq!(view_of(carol)["mutual_friends"], 1);
  assert_eq!(view_of(carol)["user"]["username"], "carol");
  assert_eq!(view_of(bob)["mutual_friends"], 0);

  let (_, body) = app.call(Method::GET, "/friends/user/dave", Some(&ta), None).await;
  assert_eq!(body["total"], 0);

  let (status, _) = app.call(Method::GET, "/friends/user/nobody", Some(&ta), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = app.call(Method::GET, "/friends/user/alice", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivated_accounts_cannot_be_targeted() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (bob, _) = app.user("bob").await;

  let (status, body) = app
    .call(
      Method::PUT,
      &format!("/internal/users/{bob}/active"),
      None,
      Some(json!({ "is_active": false })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["is_active"], false);

  let (status, _) = app
    .call(Method::POST, "/friends/request", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, body) = app.call(Method::GET, "/friends/suggestions", Some(&ta), None).await;
  assert!(body.as_array().unwrap().is_empty());

  app
    .call(
      Method::PUT,
      &format!("/internal/users/{bob}/active"),
      None,
      Some(json!({ "is_active": true })),
    )
    .await;
  let (status, _) = app
    .call(Method::POST, "/friends/request", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = app
    .call(Method::PUT, "/internal/users/999/active", None, Some(json!({ "is_active": false })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn friend_request_lifecycle() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;

  let (status, body) = app
    .call(Method::POST, "/friends/request", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["relationship"]["status"], "pending");

  // Either direction conflicts while the request is open.
  let (status, _) = app
    .call(Method::POST, "/friends/request", Some(&tb), Some(json!({ "friend_id": alice })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  // Only the recipient may accept.
  let (status, body) = app
    .call(Method::POST, "/friends/accept", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "forbidden");

  let (_, body) = app
    .call(Method::GET, "/friends/requests?direction=incoming", Some(&tb), None)
    .await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["items"][0]["user"]["username"], "alice");

  let (status, body) = app
    .call(Method::POST, "/friends/accept", Some(&tb), Some(json!({ "friend_id": alice })))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["relationship"]["status"], "accepted");

  let (_, body) = app.call(Method::GET, "/friends", Some(&ta), None).await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["items"][0]["user_id"], bob.get());
  assert_eq!(body["items"][0]["user"]["username"], "bob");
  assert_eq!(body["items"][0]["mutual_friends"], 0);

  let (_, body) = app.call(Method::GET, "/friends/status/bob", Some(&ta), None).await;
  assert_eq!(body["status"], "accepted");

  let (status, body) = app
    .call(Method::POST, "/friends/unfriend", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["relationship"], Value::Null);

  let (_, body) = app.call(Method::GET, "/friends/status/bob", Some(&ta), None).await;
  assert_eq!(body["status"], "none");

  // Unfriending again is a state error, not a missing resource.
  let (status, _) = app
    .call(Method::POST, "/friends/unfriend", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_action_and_self_target() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;

  let (status, body) = app
    .call(Method::POST, "/friends/poke", Some(&ta), Some(json!({ "friend_id": 2 })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "invalid_input");

  let (status, _) = app
    .call(Method::POST, "/friends/request", Some(&ta), Some(json!({ "friend_id": alice })))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocks_are_hidden_from_the_blocked_user() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;

  app
    .call(Method::POST, "/friends/block", Some(&ta), Some(json!({ "friend_id": bob })))
    .await;

  let (_, body) = app.call(Method::GET, "/friends/status/bob", Some(&ta), None).await;
  assert_eq!(body["status"], "blocked");
  let (_, body) = app.call(Method::GET, "/friends/status/alice", Some(&tb), None).await;
  assert_eq!(body["status"], "none");
}

#[tokio::test]
async fn suggestions_and_mutual_counts() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;
  let (carol, tc) = app.user("carol").await;
  let (dave, _) = app.user("dave").await;

  // alice-bob and bob-carol are friends; alice-carol share bob.
  for (token, target, accepter_token, requester) in [
    (&ta, bob, &tb, "alice"),
    (&tc, bob, &tb, "carol"),
  ] {
    app
      .call(Method::POST, "/friends/request", Some(token), Some(json!({ "friend_id": target })))
      .await;
    let (_, me) = app.call(Method::GET, &format!("/users/{requester}"), None, None).await;
    app
      .call(Method::POST, "/friends/accept", Some(accepter_token), Some(json!({ "friend_id": me["id"] })))
      .await;
  }

  let (_, body) = app.call(Method::GET, "/friends/mutual/carol", Some(&ta), None).await;
  assert_eq!(body["mutual_friends"], 1);

  let (status, body) = app
    .call(Method::GET, "/friends/suggestions?limit=50", Some(&ta), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  let mut ids: Vec<i64> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["user_id"].as_i64().unwrap())
    .collect();
  ids.sort();
  assert_eq!(ids, vec![carol.get(), dave.get()]);
  let carol_view = body.as_array().unwrap().iter().find(|s| s["user_id"] == carol.get()).unwrap();
  assert_eq!(carol_view["mutual_friends"], 1);
}

// ─── Groups ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn private_group_join_and_review() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;

  let (status, body) = app
    .call(
      Method::POST,
      "/groups",
      Some(&ta),
      Some(json!({ "name": "Rust Readers", "privacy": "private" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["member_count"], 1);
  assert_eq!(body["membership"]["role"], "admin");
  let gid = body["id"].as_i64().unwrap();

  // Private groups are invisible to outsiders.
  let (status, _) = app.call(Method::GET, &format!("/groups/{gid}"), Some(&tb), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (_, body) = app.call(Method::GET, "/groups", None, None).await;
  assert_eq!(body["total"], 0);

  let (status, body) = app
    .call(Method::POST, &format!("/groups/{gid}/join"), Some(&tb), Some(json!({})))
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["status"], "pending");

  // bob cannot approve himself.
  let (status, _) = app
    .call(
      Method::POST,
      &format!("/groups/{gid}/members/approve"),
      Some(&tb),
      Some(json!({ "user_id": bob })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = app
    .call(
      Method::POST,
      &format!("/groups/{gid}/members/maybe"),
      Some(&ta),
      Some(json!({ "user_id": bob })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = app
    .call(
      Method::POST,
      &format!("/groups/{gid}/members/approve"),
      Some(&ta),
      Some(json!({ "user_id": bob })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "approved");

  let (_, body) = app.call(Method::GET, &format!("/groups/{gid}"), Some(&tb), None).await;
  assert_eq!(body["member_count"], 2);

  let (_, body) = app
    .call(Method::GET, &format!("/groups/{gid}/members?role=member"), Some(&tb), None)
    .await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["items"][0]["user"]["username"], "bob");

  let (_, body) = app.call(Method::GET, "/groups/me", Some(&tb), None).await;
  assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn member_management() {
  let app = TestApp::new().await;
  let (alice, ta) = app.user("alice").await;
  let (bob, tb) = app.user("bob").await;

  let (_, group) = app
    .call(Method::POST, "/groups", Some(&ta), Some(json!({ "name": "Open Hall" })))
    .await;
  let gid = group["id"].as_i64().unwrap();
  let alice_member = group["membership"]["id"].as_i64().unwrap();

  let (_, joined) = app
    .call(Method::POST, &format!("/groups/{gid}/join"), Some(&tb), Some(json!({ "nickname": "b" })))
    .await;
  assert_eq!(joined["status"], "approved");
  let bob_member = joined["id"].as_i64().unwrap();

  // A member may rename themselves but not promote themselves.
  let (status, body) = app
    .call(
      Method::PUT,
      &format!("/groups/{gid}/members/{bob_member}"),
      Some(&tb),
      Some(json!({ "nickname": "bobby" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["nickname"], "bobby");
  let (status, _) = app
    .call(
      Method::PUT,
      &format!("/groups/{gid}/members/{bob_member}"),
      Some(&tb),
      Some(json!({ "role": "admin" })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // The creator stays an admin and cannot leave or be removed.
  let (status, _) = app
    .call(
      Method::PUT,
      &format!("/groups/{gid}/members/{alice_member}"),
      Some(&ta),
      Some(json!({ "role": "member" })),
    )
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = app.call(Method::POST, &format!("/groups/{gid}/leave"), Some(&ta), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = app
    .call(Method::DELETE, &format!("/groups/{gid}/members/{alice}"), Some(&ta), None)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = app
    .call(Method::DELETE, &format!("/groups/{gid}/members/{bob}"), Some(&ta), None)
    .await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (_, body) = app.call(Method::GET, &format!("/groups/{gid}"), None, None).await;
  assert_eq!(body["member_count"], 1);

  let (status, _) = app.call(Method::DELETE, &format!("/groups/{gid}"), Some(&ta), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = app.call(Method::GET, &format!("/groups/{gid}"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Posts ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_modes_and_visibility() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (_, tb) = app.user("bob").await;

  let mut ids = Vec::new();
  for content in ["first", "second", "third"] {
    let (status, body) = app
      .call(Method::POST, "/posts", Some(&ta), Some(json!({ "content": content })))
      .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"]["username"], "alice");
    ids.push(body["id"].as_i64().unwrap());
  }
  let (status, _) = app
    .call(Method::POST, "/posts", Some(&ta), Some(json!({ "content": "secret", "visibility": "friends" })))
    .await;
  assert_eq!(status, StatusCode::CREATED);

  // "first" gets a comment (score 2), "second" a like (score 1).
  app
    .call(Method::POST, &format!("/posts/{}/comments", ids[0]), Some(&tb), Some(json!({ "content": "nice" })))
    .await;
  let (_, engagement) = app
    .call(Method::POST, &format!("/posts/{}/like", ids[1]), Some(&tb), None)
    .await;
  assert_eq!(engagement["likes"], 1);

  let (_, body) = app.call(Method::GET, "/posts/feed?mode=popular_today", None, None).await;
  assert_eq!(body["total"], 3);
  let scores: Vec<u64> = body["items"]
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["score"].as_u64().unwrap())
    .collect();
  assert_eq!(scores, vec![2, 1, 0]);
  assert_eq!(body["items"][0]["id"], ids[0]);

  // The author sees their friends-only post; strangers do not.
  let (_, body) = app.call(Method::GET, "/posts/feed?limit=2&offset=0", Some(&ta), None).await;
  assert_eq!(body["total"], 4);
  assert_eq!(body["items"].as_array().unwrap().len(), 2);
  assert_eq!(body["items"][0]["content"], "secret");

  let (_, body) = app.call(Method::GET, "/posts/feed?limit=2&offset=3", Some(&ta), None).await;
  assert_eq!((body["total"].as_u64(), body["offset"].as_u64()), (Some(4), Some(3)));
  assert_eq!(body["items"].as_array().unwrap().len(), 1);
  assert_eq!(body["items"][0]["content"], "first");

  let (_, body) = app.call(Method::GET, "/posts/feed?mode=newest&limit=0&offset=-4", None, None).await;
  assert_eq!((body["limit"].as_u64(), body["offset"].as_u64()), (Some(10), Some(0)));
  assert_eq!(body["items"][0]["content"], "third");

  let (_, body) = app.call(Method::GET, "/users/alice/posts?mode=latest", Some(&tb), None).await;
  assert_eq!(body["total"], 3);
  assert_eq!(body["items"][0]["content"], "third");

  let (status, _) = app.call(Method::GET, "/posts/feed?mode=sideways", None, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_interactions() {
  let app = TestApp::new().await;
  let (_, ta) = app.user("alice").await;
  let (_, tb) = app.user("bob").await;

  let (_, post) = app
    .call(Method::POST, "/posts", Some(&ta), Some(json!({ "content": "hello" })))
    .await;
  let id = post["id"].as_i64().unwrap();

  for _ in 0..2 {
    let (_, engagement) = app.call(Method::POST, &format!("/posts/{id}/like"), Some(&tb), None).await;
    assert_eq!(engagement["likes"], 1);
  }
  let (status, engagement) = app.call(Method::POST, &format!("/posts/{id}/shares"), Some(&tb), None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(engagement["shares"], 1);

  let (_, body) = app
    .call(Method::POST, &format!("/posts/{id}/comments"), Some(&tb), Some(json!({ "content": "hi" })))
    .await;
  assert_eq!(body["author"]["username"], "bob");
  let (_, body) = app.call(Method::GET, &format!("/posts/{id}/comments"), None, None).await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["items"][0]["content"], "hi");

  let (_, body) = app.call(Method::GET, &format!("/posts/{id}"), None, None).await;
  assert_eq!(body["score"], 1 + 2 + 3);

  let (_, engagement) = app.call(Method::DELETE, &format!("/posts/{id}/like"), Some(&tb), None).await;
  assert_eq!(engagement["likes"], 0);

  let (status, _) = app.call(Method::DELETE, &format!("/posts/{id}"), Some(&tb), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = app.call(Method::DELETE, &format!("/posts/{id}"), Some(&ta), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = app.call(Method::GET, &format!("/posts/{id}"), None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Identity ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn internal_batch_lookup_skips_missing_ids() {
  let app = TestApp::new().await;
  let (alice, _) = app.user("alice").await;
  let (carol, _) = app.user("carol").await;
  let missing = carol.get() + 1;

  let (status, body) = app
    .call(
      Method::POST,
      "/internal/users/batch",
      None,
      Some(json!({ "user_ids": [alice, missing, carol, alice] })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  let mut found: Vec<i64> = body["users"]
    .as_array()
    .unwrap()
    .iter()
    .map(|u| u["id"].as_i64().unwrap())
    .collect();
  found.sort();
  assert_eq!(found, vec![alice.get(), carol.get()]);

  let (status, body) = app
    .call(Method::GET, "/internal/users/by-username/carol", None, None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["user_id"], carol.get());
  let (status, _) = app
    .call(Method::GET, "/internal/users/by-username/nobody", None, None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_identity_lookup_leaves_authors_unset() {
  let app = TestApp::with_broken_identity().await;
  let (_, ta) = app.user("alice").await;

  let (status, body) = app
    .call(Method::POST, "/posts", Some(&ta), Some(json!({ "content": "still works" })))
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["author"], Value::Null);

  let (status, body) = app.call(Method::GET, "/posts/feed", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["items"][0]["content"], "still works");
  assert_eq!(body["items"][0]["author"], Value::Null);

  // Username resolution has nothing to degrade to.
  let (status, body) = app.call(Method::GET, "/users/alice/posts", None, None).await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert_eq!(body["kind"], "upstream");
}
