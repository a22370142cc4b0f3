//! Infrastructure layer for chatkeep.
//!
//! Contains implementations of the port traits defined in `chatkeep-core`:
//! per-session JSON record files, the relational thread title sync, and the
//! Azure OpenAI completion provider. Also hosts configuration loading and
//! data directory resolution.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod sql;
pub mod store;
