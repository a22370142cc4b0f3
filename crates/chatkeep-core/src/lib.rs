//! Session lifecycle logic and port trait definitions for chatkeep.
//!
//! This crate defines the "ports" (store, title sync, completion traits) that
//! the infrastructure layer implements, plus the pure logic built on them:
//! the message log, the log serializer, and the session controller. It
//! depends only on `chatkeep-types` -- never on `chatkeep-infra` or any
//! database/IO crate.

pub mod chat;
pub mod llm;
