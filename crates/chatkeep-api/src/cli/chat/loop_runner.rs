//! The interactive chat loop.
//!
//! Maps terminal events onto the session lifecycle: start or resume on
//! entry, `message` per submitted line, `end` on `/end` or Ctrl+D.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use chatkeep_core::chat::controller::{EndOutcome, ResumeOutcome};
use chatkeep_types::chat::MessageRole;
use chatkeep_types::error::SessionError;

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use crate::state::{AppState, ConcreteController};

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Run an interactive session until it is ended or abandoned.
///
/// `resume` restores a stored session; otherwise a new session is started
/// with `id` or a generated UUID v7.
pub async fn run_chat_loop(state: &AppState, resume: Option<String>, id: Option<String>) -> Result<()> {
    let mut controller = state.controller()?;

    match resume {
        Some(session_id) => match controller.resume(session_id).await? {
            ResumeOutcome::Restored { messages } => {
                println!(
                    "\n  {} Previous session history loaded ({} messages)",
                    style("*").cyan().bold(),
                    messages
                );
            }
            ResumeOutcome::Fresh => {
                println!(
                    "\n  {} No previous session history found. Starting fresh.",
                    style("i").blue().bold()
                );
            }
        },
        None => {
            let session_id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
            controller.start(session_id)?;
        }
    }

    let session_id = controller.session_id().unwrap_or_default().to_string();
    println!(
        "  {} {}  {}",
        style("Session").bold(),
        style(&session_id).cyan(),
        style("(/help for commands, Ctrl+D to end)").dim()
    );
    println!();

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        match chat_input.read_line().await {
            InputEvent::Eof => {
                chat_input.flush();
                if finish(&mut controller).await {
                    break;
                }
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D or type /end to finish, /quit to leave without saving.").dim());
                continue;
            }
            InputEvent::Message(text) => {
                if text.is_empty() {
                    continue;
                }

                if let Some(cmd) = commands::parse(&text) {
                    match cmd {
                        ChatCommand::Help => commands::print_help(),
                        ChatCommand::History => print_history(&controller),
                        ChatCommand::End => {
                            chat_input.flush();
                            if finish(&mut controller).await {
                                break;
                            }
                        }
                        ChatCommand::Quit => {
                            println!("\n  {}", style("Left without saving.").dim());
                            break;
                        }
                        ChatCommand::Unknown(name) => {
                            println!(
                                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                                style("?").yellow().bold(),
                                style(name).dim()
                            );
                        }
                    }
                    continue;
                }

                let thinking = spinner("thinking...");
                let reply = controller.message(text).await;
                thinking.finish_and_clear();

                match reply {
                    Ok(reply) => {
                        println!("  {} {}", style("Assistant >").cyan().bold(), reply.trim());
                        println!();
                    }
                    Err(e) => {
                        eprintln!("\n  {} {e}\n", style("!").red().bold());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Whether the loop stops after an end attempt. A failed end keeps the
/// session open so it can be retried.
fn stops_loop(outcome: &Result<EndOutcome, SessionError>) -> bool {
    outcome.is_ok()
}

/// End the session and report the outcome. Returns `true` when the loop
/// should stop.
async fn finish(controller: &mut ConcreteController) -> bool {
    let finalizing = spinner("saving session...");
    let outcome = controller.end().await;
    finalizing.finish_and_clear();
    let stop = stops_loop(&outcome);

    match outcome {
        Ok(EndOutcome::Empty) => {
            println!("\n  {}", style("Nothing to save: the session is empty.").dim());
        }
        Ok(EndOutcome::Finalized(record)) => {
            println!();
            println!(
                "  {} {}",
                style("Title:").bold(),
                style(record.title.as_deref().unwrap_or_default()).cyan()
            );
            println!(
                "  {} {}",
                style("Summary:").bold(),
                record.summary.as_deref().unwrap_or_default()
            );
            println!();
        }
        Err(e) => {
            eprintln!(
                "\n  {} Could not end the session: {e}. Press Ctrl+D or type /end to retry, /quit to leave without saving.\n",
                style("!").red().bold()
            );
        }
    }
    stop
}

fn print_history(controller: &ConcreteController) {
    println!();
    for msg in controller.history() {
        let label = match msg.role {
            MessageRole::User => style("You").green(),
            _ => style("Assistant").cyan(),
        };
        println!(
            "  {} {} {}",
            style(msg.timestamp.format("%H:%M:%S")).dim(),
            label.bold(),
            msg.content
        );
    }
    println!();
}
