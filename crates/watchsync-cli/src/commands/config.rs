use crate::output::{Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_config::{Config, PathManager, ServiceConfig};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn run_config(cmd: ConfigCommands, config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(config, paths, output),
        ConfigCommands::Init { force } => init_config(force, paths, output),
        ConfigCommands::Paths => show_paths(paths, output),
    }
}

fn show_config(config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }
            if !config_file.exists() {
                output.warn(format!(
                    "No configuration file at {}, showing defaults. Run 'watchsync config init' to create one.",
                    config_file.display()
                ));
            }

            println!("\n{}", "Configuration".bright_cyan().bold());
            println!("{} {}\n", "File:".bright_black(), config_file.display());

            let mut services = table(vec!["Service", "Role", "Enabled", "Score format"]);
            for (role, service) in [
                ("primary", &config.services.primary),
                ("secondary", &config.services.secondary),
            ] {
                match service {
                    Some(service) => services.add_row(service_row(role, service)),
                    None => services.add_row(vec![
                        Cell::new("-"),
                        Cell::new(role),
                        Cell::new("not configured".bright_black().to_string()),
                        Cell::new(""),
                    ]),
                };
            }
            println!("{}\n", services);

            let mut retry = table(vec!["Retry", "Value"]);
            retry.add_row(vec![Cell::new("Max attempts"), Cell::new(config.retry.max_attempts)]);
            retry.add_row(vec![
                Cell::new("Backoff base"),
                Cell::new(format!("{} ms", config.retry.backoff_base_ms)),
            ]);
            retry.add_row(vec![
                Cell::new("Backoff max"),
                Cell::new(format!("{} ms", config.retry.backoff_max_ms)),
            ]);
            println!("{}\n", retry);

            let mut logging = table(vec!["Logging", "Value"]);
            logging.add_row(vec![Cell::new("Level"), Cell::new(&config.logging.level)]);
            logging.add_row(vec![Cell::new("JSON"), Cell::new(config.logging.json)]);
            logging.add_row(vec![
                Cell::new("File"),
                Cell::new(
                    config
                        .logging
                        .file
                        .as_ref()
                        .map(|f| f.display().to_string())
                        .unwrap_or_else(|| "stderr".to_string()),
                ),
            ]);
            println!("{}", logging);

            if let Err(e) = config.validate() {
                output.warn(format!("Configuration is invalid: {}", e));
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let value = serde_json::to_value(config).map_err(|e| eyre!("Failed to encode config: {}", e))?;
            output.json(&json!({
                "type": "config",
                "file": config_file.display().to_string(),
                "exists": config_file.exists(),
                "valid": config.validate().is_ok(),
                "config": value,
            }));
        }
    }
    Ok(())
}

fn init_config(force: bool, paths: &PathManager, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        output.warn(format!(
            "Configuration already exists at {}. Use --force to overwrite it.",
            config_file.display()
        ));
        return Ok(());
    }

    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create {}: {}", paths.config_dir().display(), e))?;
    Config::default()
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to write {}: {}", config_file.display(), e))?;
    output.success(format!("Wrote default configuration to {}", config_file.display()));
    Ok(())
}

fn show_paths(paths: &PathManager, output: &Output) -> Result<()> {
    let entries = [
        ("config", paths.config_file()),
        ("lists", paths.lists_dir()),
        ("original_dates", paths.original_dates_file()),
        ("logs", paths.log_dir().to_path_buf()),
    ];

    if output.is_human() {
        if output.is_quiet() {
            return Ok(());
        }
        let mut table = table(vec!["Location", "Path"]);
        for (name, path) in &entries {
            table.add_row(vec![Cell::new(name), Cell::new(path.display())]);
        }
        println!("{}", table);
    } else {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(name, path)| (name.to_string(), json!(path.display().to_string())))
            .collect();
        output.json(&json!({ "type": "paths", "paths": map }));
    }
    Ok(())
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_header(
        header
            .into_iter()
            .map(|h| Cell::new(h).fg(comfy_table::Color::Cyan).add_attribute(comfy_table::Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn service_row(role: &str, service: &ServiceConfig) -> Vec<Cell> {
    let format = serde_json::to_value(service.score_format)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    vec![
        Cell::new(&service.name),
        Cell::new(role),
        Cell::new(if service.enabled {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        }),
        Cell::new(format),
    ]
}
