//! Durable session record storage.

pub mod file;

pub use file::FileSessionStore;
