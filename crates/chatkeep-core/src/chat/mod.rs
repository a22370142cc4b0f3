//! Chat session lifecycle and chat-log subsystem.
//!
//! Leaf-first: the in-memory `MessageLog`, the log `serializer`, the
//! `SessionStore` and `ThreadTitleSync` ports, the `CompletionGateway`, and
//! the `SessionController` state machine that drives them.

pub mod controller;
pub mod gateway;
pub mod log;
pub mod serializer;
pub mod store;
pub mod title_sync;
