//! Configuration file handling for pgmerge.
//!
//! Looks for `.config/pgmerge.styx` in the current directory or any parent directory.

pub use pgmerge_config::Config;

use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = ".config/pgmerge.styx";

/// Load configuration from `.config/pgmerge.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir()?;
    load_from(&cwd)
}

/// Like [`load`], but a missing file yields the default configuration.
pub fn load_or_default() -> Result<(Config, Option<PathBuf>), ConfigError> {
    match load() {
        Ok((config, path)) => Ok((config, Some(path))),
        Err(ConfigError::NotFound) => Ok((Config::default(), None)),
        Err(e) => Err(e),
    }
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content = std::fs::read_to_string(&config_path)?;

    let config: Config =
        facet_styx::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok((config, config_path))
}

/// Find `.config/pgmerge.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no .config/pgmerge.styx found in current directory or any parent")]
    NotFound,

    #[error("failed to read .config/pgmerge.styx: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse .config/pgmerge.styx: {0}")]
    Parse(String),
}
