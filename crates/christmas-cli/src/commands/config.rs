//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use christmas_core::config::{self, ClientConfig};

use crate::output::{print_error, print_info, print_success};

fn config_file(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Show the effective configuration, with the secret masked
pub fn config_show(config_path: Option<&Path>, effective: &ClientConfig) -> Result<()> {
    let path = config_file(config_path);
    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_info(&format!("No configuration file at {:?}; using defaults", path));
    }
    println!();

    let mut shown = effective.clone();
    if shown.secret.is_some() {
        shown.secret = Some("********".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

/// Print the configuration file path
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

/// Write a default configuration file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_file(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(&path, &ClientConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    print_info("Set `secret` in it, or pass --secret / CHRISTMAS_SECRET");
    Ok(())
}
