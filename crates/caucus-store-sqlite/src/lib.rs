//! SQLite backend for the Caucus directory and order book.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

pub mod adapter;
mod encode;
mod functions;
mod options;
pub mod predicate;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
