//! Axum HTTPS server, routing, and lifecycle.
//!
//! # Responsibilities
//! - Build the TLS acceptor from the bootstrap certificate (rustls).
//! - Define the Axum router: package files, live config, frontend with SPA fallback.
//! - Inject shared application state (`AppState`) into handlers.
//! - Run the accept loop and drain connections on shutdown.

pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod router;
pub mod state;
pub mod tls;
