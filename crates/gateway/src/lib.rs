//! docguide gateway: relays Telegram messages to a hosted assistant backed
//! by a document index, keeping a bounded history per user.

pub mod bootstrap;
pub mod channel;
pub mod cli;
pub mod runtime;
