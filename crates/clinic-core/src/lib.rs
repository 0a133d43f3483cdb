//! Core types and trait definitions for the legal-clinic case store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod assignment;
pub mod case;
pub mod error;
pub mod person;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod taxonomy;

pub use error::{Error, ErrorKind, Result};
