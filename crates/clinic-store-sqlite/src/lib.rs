//! SQLite backend for the legal-clinic case store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every write runs inside a
//! `BEGIN IMMEDIATE` transaction, which takes the database write lock up
//! front and serialises writers touching the same case.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
