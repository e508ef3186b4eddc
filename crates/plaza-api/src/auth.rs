//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the caller's id in a `userId` claim. The
//! signature and `exp` are always verified; an issuer is checked when one is
//! configured. Handlers receive the caller as a typed [`CurrentUser`] or
//! [`MaybeUser`], never as an untyped request extension.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use plaza_core::UserId;
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  #[serde(rename = "userId")]
  pub user_id: i64,
  pub exp:     i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iss:     Option<String>,
}

/// Verifies (and, for operators and tests, issues) bearer tokens.
pub struct JwtVerifier {
  decoding:   DecodingKey,
  encoding:   EncodingKey,
  validation: Validation,
  issuer:     Option<String>,
}

impl JwtVerifier {
  pub fn new(secret: &str, issuer: Option<String>) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    match &issuer {
      Some(iss) => {
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[iss]);
      }
      None => validation.set_required_spec_claims(&["exp"]),
    }
    Self {
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      validation,
      issuer,
    }
  }

  /// Verify `token` and return the caller it names.
  pub fn verify(&self, token: &str) -> Result<UserId, ApiError> {
    let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
      let reason = match err.kind() {
        ErrorKind::ExpiredSignature => "token expired",
        ErrorKind::InvalidSignature => "invalid signature",
        ErrorKind::InvalidIssuer => "invalid issuer",
        ErrorKind::MissingRequiredClaim(_) => "missing required claim",
        _ => "invalid token",
      };
      ApiError::Unauthorized(reason.to_owned())
    })?;

    if data.claims.user_id <= 0 {
      return Err(ApiError::Unauthorized("invalid userId claim".to_owned()));
    }
    Ok(UserId(data.claims.user_id))
  }

  /// Sign a token for `user` valid for `ttl`.
  pub fn issue(&self, user: UserId, ttl: Duration) -> Result<String, ApiError> {
    let claims = Claims {
      user_id: user.get(),
      exp:     (Utc::now() + ttl).timestamp(),
      iss:     self.issuer.clone(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| ApiError::Store {
        kind:    plaza_core::ErrorKind::Internal,
        message: format!("failed to sign token: {e}"),
      })
  }
}

/// The bearer token in `headers`, if any. A malformed header counts as
/// present so it is rejected rather than treated as anonymous.
fn bearer(headers: &HeaderMap) -> Option<Result<&str, ApiError>> {
  let value = headers.get(header::AUTHORIZATION)?;
  let token = value
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_owned()));
  Some(token)
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The authenticated caller. Rejects the request with 401 when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

/// The caller when a valid token is supplied, `None` for anonymous requests.
/// An invalid token is still rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUser(pub Option<UserId>);

impl<S: Backend> FromRequestParts<AppState<S>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers)
      .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_owned()))??;
    state.auth.verify(token).map(CurrentUser)
  }
}

impl<S: Backend> FromRequestParts<AppState<S>> for MaybeUser {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match bearer(&parts.headers) {
      None => Ok(MaybeUser(None)),
      Some(token) => state.auth.verify(token?).map(|id| MaybeUser(Some(id))),
    }
  }
}
