//! Marketplace Source Configuration
//!
//! YAML-based configuration for marketplace sources. Provides a default
//! source list and supports loading/saving from disk. Disabled sources
//! are kept in the document so they can be re-enabled by hand.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use yaml_rust2::{Yaml, YamlLoader};

use crate::types::{MarketplaceSource, SourceFormat};

/// Default source list with the two standard marketplace kinds.
///
/// - `json` sources point at an HTTP endpoint returning an object keyed
///   by skill id.
/// - `git` sources name an `owner/repo` repository that is scanned for
///   `SKILL.md` files.
pub const DEFAULT_SOURCES_CONFIG: &str = r#"sources:
  - id: claude-skills-directory
    endpoint: "https://claudeskills.directory/api/skills.json"
    format: json
    enabled: true
    priority: 10
    timeoutSecs: 30
  - id: anthropic-skills
    endpoint: "anthropics/skills"
    format: git
    enabled: true
    priority: 20
    timeoutSecs: 120
  - id: community-skills
    endpoint: "https://skillsmp.com/api/v1/skills"
    format: json
    enabled: false
    priority: 30
    timeoutSecs: 30
"#;

/// Parse a YAML document into a source list.
fn parse_yaml_sources(docs: &[Yaml]) -> Result<Vec<MarketplaceSource>> {
    let doc = docs.first().context("Empty YAML document")?;

    let sources_yaml = doc["sources"]
        .as_vec()
        .context("Missing or invalid 'sources' key in sources config")?;

    let mut sources = Vec::with_capacity(sources_yaml.len());

    for item in sources_yaml {
        let id = item["id"]
            .as_str()
            .context("Missing 'id' in source entry")?
            .to_string();

        let endpoint = item["endpoint"]
            .as_str()
            .context("Missing 'endpoint' in source entry")?
            .to_string();

        let format = match item["format"].as_str().unwrap_or("json") {
            "git" => SourceFormat::Git,
            _ => SourceFormat::Json,
        };

        let enabled = item["enabled"].as_bool().unwrap_or(true);
        let priority = item["priority"].as_i64().unwrap_or(999) as u32;
        let timeout_secs = item["timeoutSecs"].as_i64().unwrap_or(30) as u64;

        sources.push(MarketplaceSource {
            id,
            endpoint,
            format,
            enabled,
            priority,
            timeout_secs,
        });
    }

    Ok(sources)
}

/// Load the marketplace source list from a YAML file at the given path.
///
/// Falls back to the default source list if the file does not exist.
pub fn load_sources(config_path: &Path) -> Result<Vec<MarketplaceSource>> {
    if !config_path.exists() {
        info!(
            "Sources config not found at {}, using defaults",
            config_path.display()
        );
        let docs = YamlLoader::load_from_str(DEFAULT_SOURCES_CONFIG)
            .context("Failed to parse default sources config")?;
        return parse_yaml_sources(&docs);
    }

    let contents = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read sources config from {}", config_path.display()))?;

    let docs = YamlLoader::load_from_str(&contents)
        .with_context(|| format!("Failed to parse YAML from {}", config_path.display()))?;

    let sources = parse_yaml_sources(&docs)?;
    debug!(
        "Loaded {} marketplace sources from {}",
        sources.len(),
        config_path.display()
    );
    Ok(sources)
}

/// Save the marketplace source list to a YAML file at the given path.
pub fn save_sources(sources: &[MarketplaceSource], config_path: &Path) -> Result<()> {
    let mut yaml_str = String::from("sources:\n");

    for source in sources {
        let format = match source.format {
            SourceFormat::Json => "json",
            SourceFormat::Git => "git",
        };
        yaml_str.push_str(&format!("  - id: {}\n", source.id));
        yaml_str.push_str(&format!("    endpoint: \"{}\"\n", source.endpoint));
        yaml_str.push_str(&format!("    format: {}\n", format));
        yaml_str.push_str(&format!("    enabled: {}\n", source.enabled));
        yaml_str.push_str(&format!("    priority: {}\n", source.priority));
        yaml_str.push_str(&format!("    timeoutSecs: {}\n", source.timeout_secs));
    }

    // Ensure parent directory exists.
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directory for {}",
                config_path.display()
            )
        })?;
    }

    fs::write(config_path, &yaml_str).with_context(|| {
        format!(
            "Failed to write sources config to {}",
            config_path.display()
        )
    })?;

    info!("Saved sources config to {}", config_path.display());
    Ok(())
}

/// Write the default sources config to a file.
///
/// Will not overwrite an existing file. Returns Ok(()) if the file
/// already exists.
pub fn write_default_sources(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        warn!(
            "Sources config already exists at {}, not overwriting",
            config_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directory for {}",
                config_path.display()
            )
        })?;
    }

    fs::write(config_path, DEFAULT_SOURCES_CONFIG).with_context(|| {
        format!(
            "Failed to write default sources config to {}",
            config_path.display()
        )
    })?;

    info!("Wrote default sources config to {}", config_path.display());
    Ok(())
}

/// Enabled sources in merge order: stable-sorted by priority, so the
/// document order breaks ties and output stays deterministic.
pub fn enabled_sources(sources: &[MarketplaceSource]) -> Vec<MarketplaceSource> {
    let mut enabled: Vec<MarketplaceSource> =
        sources.iter().filter(|s| s.enabled).cloned().collect();
    enabled.sort_by_key(|s| s.priority);
    enabled
}
