//! Stored session commands: list and show.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use chatkeep_core::chat::serializer;
use chatkeep_core::chat::store::SessionStore;
use chatkeep_types::chat::format_timestamp;

use crate::state::AppState;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

/// List stored sessions with title, message count and last write time.
///
/// # Examples
///
/// ```bash
/// chatkeep sessions
/// chatkeep sessions --json
/// ```
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions stored in {}. Start one with: {}",
            style("i").blue().bold(),
            style(state.store.dir().display()).dim(),
            style("chatkeep chat").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Saved").fg(Color::White),
    ]);

    for session in &sessions {
        let title = match session.title.as_deref() {
            Some(title) => Cell::new(truncate(title, 40)).fg(Color::Cyan),
            None => Cell::new("(untitled)").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&session.session_id).fg(Color::White),
            title,
            Cell::new(session.message_count.to_string()).fg(Color::White),
            Cell::new(&session.timestamp).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Print one stored session: title, summary and the rendered log.
///
/// # Examples
///
/// ```bash
/// chatkeep show <session-id>
/// chatkeep show <session-id> --json
/// ```
pub async fn show_session(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let record = state
        .store
        .load(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Session").bold(),
        style(&record.session_id).cyan()
    );
    println!(
        "  {} {}",
        style("Title:").bold(),
        record.title.as_deref().unwrap_or("(untitled)")
    );
    if let Some(summary) = record.summary.as_deref() {
        println!("  {} {summary}", style("Summary:").bold());
    }
    println!(
        "  {} {}",
        style("Started:").bold(),
        format_timestamp(&record.created_at)
    );
    match record.ended_at {
        Some(ended) => println!("  {} {}", style("Ended:").bold(), format_timestamp(&ended)),
        None => println!("  {} {}", style("Ended:").bold(), style("not finalized").dim()),
    }
    println!();

    for line in serializer::format_text(&record.history).lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}
