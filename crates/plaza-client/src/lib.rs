//! HTTP client for the batch identity lookup service.
//!
//! [`IdentityClient`] is constructed once at process start and handed to
//! whatever needs display identities; [`IdentityClient::close`] ends its
//! lifecycle at shutdown. Every request carries the configured timeout
//! (5 seconds unless overridden), so a slow identity service never stalls the
//! caller for longer than that.

pub mod error;

#[cfg(test)]
mod tests;

use std::{
  collections::HashMap,
  sync::atomic::{AtomicBool, Ordering},
  time::Duration,
};

use plaza_core::{
  UserId,
  identity::{
    BatchLookup, BatchLookupResponse, DisplayIdentity, IdentityResolver, UsernameLookup,
    dedup_ids,
  },
};
use reqwest::{Client, StatusCode, Url};

pub use error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for `POST /internal/users/batch` and
/// `GET /internal/users/by-username/{username}` on a remote plaza instance.
pub struct IdentityClient {
  client: Client,
  base:   Url,
  closed: AtomicBool,
}

impl IdentityClient {
  /// Build a client for the service at `base_url`. No request is made.
  pub fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
    let base = Url::parse(base_url).map_err(|_| Error::InvalidUrl(base_url.to_owned()))?;
    if base.cannot_be_a_base() {
      return Err(Error::InvalidUrl(base_url.to_owned()));
    }
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(Error::Build)?;
    tracing::info!(%base, ?timeout, "identity client ready");
    Ok(Self { client, base, closed: AtomicBool::new(false) })
  }

  pub fn new(base_url: &str) -> Result<Self> { Self::connect(base_url, DEFAULT_TIMEOUT) }

  /// Stop serving lookups. Later calls fail with [`Error::Closed`].
  pub fn close(&self) {
    if !self.closed.swap(true, Ordering::SeqCst) {
      tracing::info!(base = %self.base, "identity client closed");
    }
  }

  pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }

  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    // `connect` rejected cannot-be-a-base urls, so this always succeeds.
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn ensure_open(&self) -> Result<()> {
    if self.is_closed() { Err(Error::Closed) } else { Ok(()) }
  }

  async fn batch(&self, ids: Vec<UserId>) -> Result<HashMap<UserId, DisplayIdentity>> {
    self.ensure_open()?;
    let ids = dedup_ids(ids);
    if ids.is_empty() {
      return Ok(HashMap::new());
    }

    let url = self.endpoint(&["internal", "users", "batch"]);
    let path = url.path().to_owned();
    let resp = self
      .client
      .post(url)
      .json(&BatchLookup { user_ids: ids.clone() })
      .send()
      .await
      .map_err(|source| Error::Request { path: path.clone(), source })?;

    if !resp.status().is_success() {
      return Err(Error::Status { path, status: resp.status() });
    }
    let body: BatchLookupResponse = resp
      .json()
      .await
      .map_err(|source| Error::Request { path, source })?;

    let found: HashMap<_, _> = body
      .users
      .into_iter()
      .filter(|u| ids.binary_search(&u.id).is_ok())
      .map(|u| (u.id, u))
      .collect();
    tracing::debug!(requested = ids.len(), resolved = found.len(), "batch identity lookup");
    Ok(found)
  }

  async fn by_username(&self, username: String) -> Result<Option<UserId>> {
    self.ensure_open()?;
    let url = self.endpoint(&["internal", "users", "by-username", &username]);
    let path = url.path().to_owned();
    let resp = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|source| Error::Request { path: path.clone(), source })?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => {
        let body: UsernameLookup = resp
          .json()
          .await
          .map_err(|source| Error::Request { path, source })?;
        Ok(Some(body.user_id))
      }
      status => Err(Error::Status { path, status }),
    }
  }
}

impl IdentityResolver for IdentityClient {
  type Error = Error;

  async fn resolve_batch(&self, ids: Vec<UserId>) -> Result<HashMap<UserId, DisplayIdentity>> {
    self.batch(ids).await
  }

  async fn resolve_username(&self, username: String) -> Result<Option<UserId>> {
    self.by_username(username).await
  }
}
