//! Slash command parsing for the chat loop.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// End the session: generate title and summary, save, exit.
    End,
    /// Show the conversation so far.
    History,
    /// Leave without finalizing.
    Quit,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/end" | "/exit" => Some(ChatCommand::End),
        "/history" => Some(ChatCommand::History),
        "/quit" | "/q" => Some(ChatCommand::Quit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}     End the session and save it (also Ctrl+D)", style("/end").cyan());
    println!("  {} Show the conversation so far", style("/history").cyan());
    println!("  {}    Leave without saving", style("/quit").cyan());
    println!("  {}    Show this help message", style("/help").cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_not_command() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("what is 1/2?"), None);
    }

    #[test]
    fn test_parse_end_aliases() {
        assert_eq!(parse("/end"), Some(ChatCommand::End));
        assert_eq!(parse("  /EXIT  "), Some(ChatCommand::End));
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(parse("/history"), Some(ChatCommand::History));
        assert_eq!(parse("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
        assert_eq!(
            parse("/frobnicate now"),
            Some(ChatCommand::Unknown("/frobnicate".to_string()))
        );
    }
}
