//! Per-user conversation sessions for docguide.
//!
//! A process-wide [`SessionStore`] maps each user identity to one
//! [`Session`], whose history is bounded to a fixed window of turns.
//! The registry and each session are guarded independently so unrelated
//! users never contend.

pub mod store;

pub use store::{Session, SessionStore};
