//! Shared HTTP core for vendor API clients.
//!
//! Each vendor client holds an [`HttpCore`] and builds its own endpoints on
//! top of the `get`/`post`/`delete` primitives here.

mod client;

pub use client::{HttpCore, HttpError, HttpSettings};
