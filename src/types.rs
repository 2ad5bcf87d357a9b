//! Skillfeed - Type Definitions
//!
//! All shared types for the skills catalog refresher: catalog entries,
//! marketplace source configuration, rendered documents, and per-run
//! bookkeeping.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Catalog Entries ─────────────────────────────────────────────

/// A fully aggregated catalog entry.
///
/// `name` is unique within a marketplace but not globally; the
/// aggregator guarantees one listing per `(name, source_marketplace)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub link: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub source_marketplace: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A raw candidate as parsed from a marketplace response, before
/// validation and taxonomy assignment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCandidate {
    pub name: String,
    pub description: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ─── Marketplace Sources ─────────────────────────────────────────

/// Wire format a marketplace source speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// HTTP endpoint returning a JSON object keyed by skill id.
    Json,
    /// An `owner/repo` GitHub repository scanned for `SKILL.md` files.
    Git,
}

/// A configured marketplace source.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceSource {
    /// Stable identifier; recorded on every skill as `source_marketplace`.
    pub id: String,
    /// URL for `json` sources, `owner/repo` for `git` sources.
    pub endpoint: String,
    pub format: SourceFormat,
    pub enabled: bool,
    /// Merge precedence; lower values win name collisions across sources.
    pub priority: u32,
    pub timeout_secs: u64,
}

/// Failure of a single marketplace fetch. Recoverable at run level:
/// the source is skipped for the cycle and counted in the summary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("marketplace returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("repository clone failed: {0}")]
    Clone(String),
}

/// Result of fetching one source, tagged with its id so the summary can
/// report which marketplaces failed.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub result: Result<Vec<SkillCandidate>, SourceError>,
}

/// Trait that every marketplace reader must implement.
///
/// The pipeline only ever talks to this seam, so tests can substitute a
/// canned fetcher and runs never depend on live marketplaces.
#[async_trait]
pub trait MarketplaceFetcher: Send + Sync {
    async fn fetch_source(
        &self,
        source: &MarketplaceSource,
    ) -> Result<Vec<SkillCandidate>, SourceError>;
}

// ─── Rendered Documents ──────────────────────────────────────────

/// A generated output artifact (the index or the full listing).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub content: String,
    pub generated_at: DateTime<Utc>,
    pub total_count: usize,
}

// ─── Run Bookkeeping ─────────────────────────────────────────────

/// Phases of a single refresh run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Fetching,
    Aggregating,
    Rendering,
    Comparing,
    Publishing,
    NoOp,
    Done,
}

/// Outcome of the publish step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Content changed; a commit was created and pushed.
    Published { commit: String },
    /// Nothing but the timestamp differed; no action taken.
    NoChange,
}

/// Summary of one refresh run, logged and returned to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub sources_total: usize,
    pub sources_failed: usize,
    pub skills_total: usize,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefresherConfig {
    /// Checkout of the catalog repository the documents are published to.
    pub repo_path: String,
    /// Push target. An `http(s)` URL gets the scoped credential injected;
    /// anything else is passed to git verbatim. Empty means `origin`.
    pub remote_url: String,
    pub branch: String,
    /// Index document path, relative to `repo_path`.
    pub index_file: String,
    /// Full listing document path, relative to `repo_path`.
    pub listing_file: String,
    /// Name of the environment variable holding the push credential.
    pub credential_env: String,
    pub commit_author_name: String,
    pub commit_author_email: String,
    /// Fallback per-source timeout when a source does not set one.
    pub fetch_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    /// Six-field cron expression driving scheduled refreshes.
    pub refresh_schedule: String,
    pub tick_interval_secs: u64,
    /// Location of the sources YAML document.
    pub sources_path: String,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Returns the default `RefresherConfig`. Fields with no sensible
/// default are empty strings so callers can override them.
pub fn default_config() -> RefresherConfig {
    RefresherConfig {
        repo_path: "~/.skillfeed/catalog".to_string(),
        remote_url: String::new(),
        branch: "main".to_string(),
        index_file: "README.md".to_string(),
        listing_file: "FULL_SKILLS.md".to_string(),
        credential_env: "SKILLFEED_TOKEN".to_string(),
        commit_author_name: "Skillfeed".to_string(),
        commit_author_email: "skillfeed@users.noreply.github.com".to_string(),
        fetch_timeout_secs: 30,
        max_concurrent_fetches: 4,
        refresh_schedule: "0 0 * * * *".to_string(),
        tick_interval_secs: 30,
        sources_path: "~/.skillfeed/sources.yml".to_string(),
        log_level: LogLevel::Info,
    }
}
