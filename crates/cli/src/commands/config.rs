//! `remedy config`: show configuration.

use remedy_config::AppConfig;
use std::path::Path;

pub fn run(config: &AppConfig, path: Option<&Path>, default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    let state = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("Config file: {}{state}", path.display());
    println!("{config:#?}");

    match config.require_agent_credentials() {
        Ok(()) => println!("Credentials: ok"),
        Err(e) => println!("Credentials: {e}"),
    }
    Ok(())
}
