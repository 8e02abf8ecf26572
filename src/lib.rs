//! shelfmark: a personal reading-tracking server.
//!
//! This crate provides a small HTTP server for tracking a personal
//! library: books and their reading lifecycle, quotes, append-only
//! reading logs, curated multi-level reading lists, and a yearly
//! reading challenge with main/bonus books per month.
//!
//! # Features
//!
//! - Book reading state machine (to-read / reading / completed / DNF)
//! - Reading-goal pacing projection
//! - Yearly challenge with bonus-book unlock gating
//! - Curated reading lists with ordered levels
//! - Quotes and append-only reading logs per book
//! - Book metadata lookup via an external search API
//! - Add-by-URL from a configured bookstore

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Challenge progress aggregation and bonus unlocking.
pub mod challenge;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// External metadata collaborators.
pub mod metadata;
/// Book state machine and goal projection.
pub mod progress;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
