//! Config command - show the effective configuration for a project

use anyhow::{Context, Result};
use colored::*;
use refprune_config::ConfigLoader;
use std::path::Path;

/// Print the merged configuration that `refprune prune <path>` would use
pub fn run(path: &Path, json: bool) -> Result<()> {
    let config = ConfigLoader::new()
        .load_for_project(path)
        .with_context(|| format!("Failed to load configuration for {}", path.display()))?;
    let builder = config.resolve_builder().ok();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "config": config,
                "resolved_builder": builder.as_ref().map(|b| b.display().to_string()),
            }))?
        );
        return Ok(());
    }

    match &config.config_file {
        Some(file) => println!("# from {}", file.display()),
        None => println!("# no refprune.toml found, using defaults"),
    }
    print!("{}", toml::to_string_pretty(&config)?);
    println!();
    match builder {
        Some(builder) => println!("{} {}", "builder:".bold(), builder.display()),
        None => println!(
            "{} {}",
            "builder:".bold(),
            "not found (set [builder] path or REFPRUNE_BUILDER)".yellow()
        ),
    }
    Ok(())
}
