//! Error types for `plaza-client`.

use plaza_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid identity service url {0:?}")]
  InvalidUrl(String),

  #[error("failed to build HTTP client: {0}")]
  Build(#[source] reqwest::Error),

  #[error("identity lookup {path} failed: {source}")]
  Request {
    path:   String,
    #[source]
    source: reqwest::Error,
  },

  #[error("identity lookup {path} returned {status}")]
  Status {
    path:   String,
    status: reqwest::StatusCode,
  },

  #[error("identity client is closed")]
  Closed,
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::InvalidUrl(_) | Error::Build(_) => ErrorKind::Internal,
      Error::Request { .. } | Error::Status { .. } | Error::Closed => ErrorKind::Upstream,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
