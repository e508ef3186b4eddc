//! Layered server configuration: built-in defaults, then an optional TOML
//! file, then `PLAZA_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// HS256 secret shared with whatever issues bearer tokens.
  pub jwt_secret:            String,
  #[serde(default)]
  pub jwt_issuer:            Option<String>,
  /// Base url of a remote identity service. Unset means this instance
  /// resolves identities from its own store.
  #[serde(default)]
  pub identity_url:          Option<String>,
  pub identity_timeout_secs: u64,
}

pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/plaza/plaza.db")?
    .set_default("identity_timeout_secs", 5)?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("PLAZA"))
    .build()
    .context("failed to read config file")?;

  let cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if cfg.jwt_secret.trim().is_empty() {
    anyhow::bail!("jwt_secret must be set (config file or PLAZA_JWT_SECRET)");
  }
  Ok(cfg)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
