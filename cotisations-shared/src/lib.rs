//! # Cotisations Shared Library
//!
//! Persistence, domain models and ranking used by the contribution tracker
//! API and its navigation shell.
//!
//! ## Module Organization
//!
//! - `db`: SQLite pool and versioned migrations
//! - `store`: Document store over the collections (CRUD, search, snapshots)
//! - `models`: Typed records (cantons, villages, quarters, members, payments)
//! - `ranking`: Leaderboards over the territorial hierarchy
//! - `events`: In-process "data changed" / "route changed" notifications
//! - `session`: Persisted UI preferences (last route, sidebar state)

pub mod db;
pub mod events;
pub mod models;
pub mod ranking;
pub mod session;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
