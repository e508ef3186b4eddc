//! SQLite backend for the Plaza stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every ledger mutation runs inside a
//! single `rusqlite` transaction.

mod content;
mod encode;
mod groups;
mod relationships;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
