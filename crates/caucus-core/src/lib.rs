//! Core types and trait definitions for the Caucus contact marketplace.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! directory store, the order pipeline, and the API all depend on it.

// Native `async fn` in traits; the explicit signatures below spell out the
// `Send` bounds, so the advisory lint is noise here.
#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod contact;
pub mod directory;
pub mod error;
pub mod filter;
pub mod order;
pub mod ports;
pub mod segment;

pub use error::{Error, Result};
