//! Thread database commands.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::state::AppState;

/// List the most recently updated threads and their titles.
///
/// # Examples
///
/// ```bash
/// chatkeep titles
/// chatkeep titles --limit 20 --json
/// ```
pub async fn list_titles(state: &AppState, limit: u32, json: bool) -> Result<()> {
    let db = state
        .thread_db()
        .context("Thread database not configured (set PG_USER and PG_DATABASE)")?;

    let threads = db.recent_threads(limit).await?;

    if json {
        let rows: Vec<serde_json::Value> = threads
            .iter()
            .map(|t| serde_json::json!({ "id": t.id, "name": t.name }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if threads.is_empty() {
        println!("\n  {} No threads found.\n", style("i").blue().bold());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Thread").fg(Color::White),
        Cell::new("Title").fg(Color::White),
    ]);

    for thread in &threads {
        let name = match thread.name.as_deref() {
            Some(name) => Cell::new(name).fg(Color::Cyan),
            None => Cell::new("(untitled)").fg(Color::DarkGrey),
        };
        table.add_row(vec![Cell::new(&thread.id).fg(Color::White), name]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}
