//! plaza server binary.
//!
//! Reads `plaza.toml` (or the path given with `--config`) layered under
//! `PLAZA_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP until interrupted.
//!
//! # Tokens for local testing
//!
//! ```
//! cargo run -p plaza-server -- --issue-token 1
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use plaza_api::{AppState, IdentityBackend, JwtVerifier};
use plaza_client::IdentityClient;
use plaza_core::UserId;
use plaza_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Plaza social graph server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "plaza.toml")]
  config: PathBuf,

  /// Print a bearer token for this user id and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<i64>,

  /// Lifetime of a token printed by `--issue-token`, in hours.
  #[arg(long, default_value_t = 24)]
  token_ttl_hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = settings::load(&cli.config)?;
  let verifier = JwtVerifier::new(&server_cfg.jwt_secret, server_cfg.jwt_issuer.clone());

  // Helper mode: sign a token and exit.
  if let Some(user_id) = cli.issue_token {
    let token = verifier
      .issue(UserId(user_id), chrono::Duration::hours(cli.token_ttl_hours))
      .context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  // Open SQLite store.
  let store_path = settings::expand_tilde(&server_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Identity lookups: remote service if configured, else our own store.
  let identity = match &server_cfg.identity_url {
    Some(url) => {
      let timeout = Duration::from_secs(server_cfg.identity_timeout_secs);
      let client = IdentityClient::connect(url, timeout)
        .with_context(|| format!("failed to set up identity client for {url}"))?;
      IdentityBackend::Remote(client)
    }
    None => IdentityBackend::Local(Arc::clone(&store)),
  };

  let state = AppState::new(store, identity, verifier);
  let app = plaza_api::router(state.clone());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  state.identity.close();
  tracing::info!("shut down");
  Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }
  tracing::info!("shutdown signal received");
}
