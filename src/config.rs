//! Refresher Configuration
//!
//! Loads and saves the refresher's configuration from
//! `~/.skillfeed/config.json`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::{default_config, RefresherConfig};

/// Directory name under the user's home.
const FEED_DIR_NAME: &str = ".skillfeed";

/// Config file name within the skillfeed directory.
const CONFIG_FILENAME: &str = "config.json";

/// Returns the skillfeed state directory: `~/.skillfeed`, or the value
/// of `SKILLFEED_DIR` when set.
pub fn get_feed_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SKILLFEED_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    home.join(FEED_DIR_NAME)
}

/// Returns the full path to the config file: `~/.skillfeed/config.json`.
pub fn get_config_path() -> PathBuf {
    get_feed_dir().join(CONFIG_FILENAME)
}

/// Load the refresher config from disk.
///
/// Reads `~/.skillfeed/config.json` and merges missing fields with
/// defaults so older config files keep working when new fields appear.
///
/// Returns `None` if the config file does not exist or cannot be parsed.
pub fn load_config() -> Option<RefresherConfig> {
    let config_path = get_config_path();
    if !config_path.exists() {
        return None;
    }

    let contents = fs::read_to_string(&config_path).ok()?;
    let mut config: RefresherConfig = serde_json::from_str(&contents).ok()?;

    // Merge defaults for unset fields
    let defaults = default_config();

    if config.repo_path.is_empty() {
        config.repo_path = defaults.repo_path;
    }
    if config.branch.is_empty() {
        config.branch = defaults.branch;
    }
    if config.index_file.is_empty() {
        config.index_file = defaults.index_file;
    }
    if config.listing_file.is_empty() {
        config.listing_file = defaults.listing_file;
    }
    if config.credential_env.is_empty() {
        config.credential_env = defaults.credential_env;
    }
    if config.commit_author_name.is_empty() {
        config.commit_author_name = defaults.commit_author_name;
    }
    if config.commit_author_email.is_empty() {
        config.commit_author_email = defaults.commit_author_email;
    }
    if config.fetch_timeout_secs == 0 {
        config.fetch_timeout_secs = defaults.fetch_timeout_secs;
    }
    if config.max_concurrent_fetches == 0 {
        config.max_concurrent_fetches = defaults.max_concurrent_fetches;
    }
    if config.refresh_schedule.is_empty() {
        config.refresh_schedule = defaults.refresh_schedule;
    }
    if config.tick_interval_secs == 0 {
        config.tick_interval_secs = defaults.tick_interval_secs;
    }
    if config.sources_path.is_empty() {
        config.sources_path = defaults.sources_path;
    }

    Some(config)
}

/// Save the refresher config to disk at `~/.skillfeed/config.json`.
///
/// Creates the skillfeed directory with mode 0o700 if it does not exist.
/// The config file is written with mode 0o600 since it names the
/// credential variable and repository locations.
pub fn save_config(config: &RefresherConfig) -> Result<()> {
    let dir = get_feed_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir).context("Failed to create skillfeed directory")?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
    }

    let config_path = get_config_path();
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&config_path, &json).context("Failed to write config file")?;
    fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

/// Resolve a path that may start with `~` to an absolute path.
///
/// If the path starts with `~`, the tilde is replaced with the user's
/// home directory. Otherwise the path is returned as-is.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}
