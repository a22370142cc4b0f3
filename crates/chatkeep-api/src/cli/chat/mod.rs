//! Interactive CLI chat: line input, slash commands, and the loop that drives
//! the session controller. Entry point: `loop_runner::run_chat_loop`.

pub mod commands;
pub mod input;
pub mod loop_runner;
