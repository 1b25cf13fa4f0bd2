//! # tether-store
//!
//! Embedded SQLite storage for account-link records.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for the `links`
//! table. Every call may block on disk I/O; async callers are expected to
//! run them on a blocking worker (the link repository does exactly that).

pub mod database;
pub mod links;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
