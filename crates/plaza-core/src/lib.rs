//! Core types, ledger state machines and store traits for Plaza.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! relationship and membership rules live here as pure functions; storage
//! backends load the current state, ask these functions what to do, and apply
//! the answer atomically.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod feed;
pub mod group;
pub mod identity;
pub mod ids;
pub mod page;
pub mod relationship;
pub mod store;

pub use error::{Classify, Error, ErrorKind, Result};
pub use ids::{GroupId, PostId, UserId};
