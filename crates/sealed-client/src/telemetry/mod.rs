//! Structured logging and optional OTLP span export, shared by the client
//! and the gateway binaries.
//!
//! # Telemetry invariants
//!
//! - **No key material, plaintext or ciphertext** may appear in any span
//!   attribute or log field.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
