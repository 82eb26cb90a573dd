//! tether-read: a self-hosted EPUB shelf with upload, presigned reading
//! links and reading progress sync.
//!
//! This crate provides a single-binary server where users upload EPUB
//! files, browse their shelf with search, sort and pagination, and keep
//! their reading position in sync across devices.
//!
//! # Features
//!
//! - Per-user book shelf with search, sort, pagination and status filters
//! - EPUB upload into a filesystem object store with opaque keys
//! - Time-limited presigned read links, fresh per request
//! - Reading position (CFI) and completion percentage sync
//! - Client-side debounce and local-fallback helpers for progress writes
//! - Opaque bearer-token authentication with distinct failure kinds

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Token verification and account management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Shelf listing queries.
pub mod listing;
/// Client-side progress sync support.
pub mod progress;
/// HTTP server.
pub mod server;
/// Object storage for book bytes.
pub mod storage;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
