//! Shared domain types for chatkeep.
//!
//! This crate contains the core domain types used across the workspace:
//! chat messages, session records, completion requests, configuration,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, urlencoding.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
