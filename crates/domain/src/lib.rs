//! Shared types for docguide: the error enum, configuration model,
//! conversation turns, streaming events, and structured trace events.

pub mod config;
pub mod error;
pub mod stream;
pub mod trace;
pub mod turn;

pub use error::{Error, Result};
