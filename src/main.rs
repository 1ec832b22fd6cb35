//! Learning platform backend: activities, courses, and answer evaluation.
//!
//! - Axum REST API guarded by bearer tokens from the identity provider
//! - Text answers graded by an OpenAI-compatible chat model (optional)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3001)
//!   LEARN_CONFIG_PATH      : path to TOML config (prompts, grading, seed bank)
//!   OPENAI_API_KEY         : enables text grading if present
//!   OPENAI_BASE_URL        : default "https://api.openai.com/v1"
//!   OPENAI_GRADING_MODEL   : default "gpt-4o-mini"
//!   IDENTITY_DOMAIN        : identity tenant base URL, e.g. "https://tenant.auth0.com"
//!   IDENTITY_CLIENT_ID     : management API client id (roles, nicknames)
//!   IDENTITY_CLIENT_SECRET : management API client secret
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod seeds;
mod state;
mod protocol;
mod error;
mod logic;
mod evaluator;
mod grading;
mod openai;
mod identity;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::new());
  let app = build_router(state);

  let port = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .unwrap_or(DEFAULT_PORT);
  let addr = SocketAddr::from(([0, 0, 0, 0], port));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "learn_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "learn_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(target: "learn_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "learn_backend", "Shutdown signal received");
}
