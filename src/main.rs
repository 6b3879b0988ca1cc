//! Grammar Trainer · English grammar practice backend
//!
//! - Axum HTTP + WebSocket API (lessons, exercises, answer checks, sessions, progress)
//! - Optional OpenAI integration (translate checks, feedback, tutor, exercise generation)
//! - Static frontend fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   OPENAI_API_KEY       : enables OpenAI integration if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL    : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL  : default "gpt-4o"
//!   CONTENT_CONFIG_PATH  : path to TOML config (prompts, limits, lesson bank)
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod config;
mod domain;
mod error;
mod logic;
mod openai;
mod progress;
mod protocol;
mod quiz;
mod ratelimit;
mod routes;
mod seeds;
mod sessions;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;

const LIMITER_CLEANUP_EVERY: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // One process-wide state (stores, OpenAI client, prompts, limiter).
  let state = Arc::new(AppState::new());

  let limiter = state.tutor_limiter.clone();
  let cleanup = tokio::spawn(async move {
    let mut interval = tokio::time::interval(LIMITER_CLEANUP_EVERY);
    loop {
      interval.tick().await;
      limiter.cleanup().await;
    }
  });

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "grammar_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  cleanup.abort();
  info!(target: "grammar_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!(target: "grammar_backend", error = %e, "Failed to listen for Ctrl-C");
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
        warn!(target: "grammar_backend", error = %e, "Failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!(target: "grammar_backend", "Shutdown signal received");
}
