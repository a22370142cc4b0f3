//! Relational thread table access.

pub mod thread;

pub use thread::{SqlThreadTitleSync, ThreadRow};
