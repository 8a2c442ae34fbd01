//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - Certificate and key file locations must never appear in any span
//!   attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
