use super::select_service;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Color, Table};
use media_sync_config::{Config, PathManager};
use media_sync_core::{FileOriginalDateStore, OriginalDateStore};
use media_sync_models::{PartialDate, WatchEntry, WatchStatus};
use media_sync_sources::LocalListService;
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_show(config: &Config, paths: &PathManager, service: Option<&str>, output: &Output) -> Result<()> {
    let service = select_service(config, service)?;
    let list_file = paths.local_list_file(&service.name);
    let list = LocalListService::open(&service.name, &list_file)
        .map_err(|e| eyre!("Failed to open list at {}: {}", list_file.display(), e))?;
    let store = FileOriginalDateStore::open(&paths.original_dates_file())
        .map_err(|e| eyre!("Failed to open original completion dates: {}", e))?;

    let entries = list.entries().await;
    let mut rows = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        // Stash keys are the list key prefixed with the service
        let stash_key = format!("{}:{}", service.name.to_lowercase(), key);
        let original = store.read(&stash_key).await?;
        rows.push((key, entry, original));
    }

    if !output.is_human() {
        let items: Vec<_> = rows
            .iter()
            .map(|(key, entry, original)| {
                json!({
                    "key": key,
                    "entry": entry,
                    "original_completion_date": original,
                })
            })
            .collect();
        output.json(&json!({
            "type": "list",
            "service": service.name,
            "entries": items,
        }));
        return Ok(());
    }
    if output.is_quiet() {
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", format!("The {} list is empty", service.name).bright_black());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Item").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Status").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Progress").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Rewatches").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Started").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Completed").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("First completed").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Rating").add_attribute(comfy_table::Attribute::Bold),
    ]);
    for (key, entry, original) in &rows {
        table.add_row(vec![
            Cell::new(key),
            status_cell(entry),
            Cell::new(progress(entry)),
            Cell::new(entry.repeat.unwrap_or(0)),
            Cell::new(PartialDate::format(entry.started_at.as_ref())),
            Cell::new(PartialDate::format(entry.completed_at.as_ref())),
            Cell::new(original.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(
                entry
                    .score
                    .and_then(|score| service.score_format.to_rating(score))
                    .map(|rating| format!("{}/10", rating))
                    .unwrap_or_default(),
            ),
        ]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    println!("{}", table);
    Ok(())
}

fn status_cell(entry: &WatchEntry) -> Cell {
    let Some(status) = entry.status else {
        return Cell::new("-").fg(Color::DarkGrey);
    };
    let color = match status {
        WatchStatus::Completed => Color::Green,
        WatchStatus::Repeating => Color::Cyan,
        WatchStatus::Current => Color::Yellow,
        WatchStatus::Planning | WatchStatus::Paused | WatchStatus::Dropped => Color::DarkGrey,
    };
    Cell::new(status).fg(color)
}

fn progress(entry: &WatchEntry) -> String {
    match (entry.progress, entry.total_episodes) {
        (Some(progress), Some(total)) => format!("{}/{}", progress, total),
        (Some(progress), None) => progress.to_string(),
        (None, _) => "-".to_string(),
    }
}
