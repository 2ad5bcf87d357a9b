//! Refresh Pipeline
//!
//! One refresh run: Fetching -> Aggregating -> Rendering -> Comparing
//! -> NoOp | Publishing -> Done. There are no retries inside a run; a
//! failed run waits for the next scheduled trigger.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, Catalog};
use crate::config::resolve_path;
use crate::fetch::fetch_all;
use crate::render::{render_full_listing, render_index};
use crate::sources::enabled_sources;
use crate::types::{
    MarketplaceFetcher, MarketplaceSource, PublishOutcome, RefresherConfig, RenderedDocument,
    RunPhase, RunSummary, SourceOutcome,
};

/// Everything a run produces before the publish decision.
pub struct RunArtifacts {
    pub outcomes: Vec<SourceOutcome>,
    pub catalog: Catalog,
    pub index: RenderedDocument,
    pub listing: RenderedDocument,
}

/// Validate configuration before any fetch is attempted.
///
/// Returns the enabled sources in merge order. Fails when no source is
/// enabled, or when the remote is `http(s)` and the credential variable
/// is unset (the publish step would be doomed, so the run never starts).
pub fn validate(
    config: &RefresherConfig,
    sources: &[MarketplaceSource],
) -> Result<Vec<MarketplaceSource>> {
    let enabled = enabled_sources(sources);
    if enabled.is_empty() {
        bail!("No marketplace sources are enabled");
    }

    let remote_needs_credential =
        config.remote_url.starts_with("http://") || config.remote_url.starts_with("https://");
    if remote_needs_credential && std::env::var(&config.credential_env).is_err() {
        bail!(
            "Push credential missing: environment variable {} is not set",
            config.credential_env
        );
    }

    Ok(enabled)
}

/// Run the read/aggregate/render stages against the given sources.
///
/// Fails only when every source failed; publishing an empty catalog
/// because the network was down would wipe the published listing.
pub async fn execute(
    fetcher: Arc<dyn MarketplaceFetcher>,
    config: &RefresherConfig,
    enabled: &[MarketplaceSource],
) -> Result<RunArtifacts> {
    info!("[{:?}] Reading {} sources", RunPhase::Fetching, enabled.len());
    let outcomes = fetch_all(fetcher, enabled, config.max_concurrent_fetches).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!("{} of {} sources failed this cycle", failed, outcomes.len());
    }
    if !outcomes.is_empty() && failed == outcomes.len() {
        bail!("All {} marketplace sources failed; keeping published catalog", failed);
    }

    info!("[{:?}] Merging candidates", RunPhase::Aggregating);
    let catalog = aggregate(&outcomes);

    info!(
        "[{:?}] {} skills across {} categories",
        RunPhase::Rendering,
        catalog.total,
        catalog.sections.len()
    );
    let generated_at = Utc::now();
    let listing = render_full_listing(&catalog, generated_at);
    let index = render_index(&catalog, generated_at, &config.listing_file);

    Ok(RunArtifacts {
        outcomes,
        catalog,
        index,
        listing,
    })
}

/// Run one complete refresh: validate, execute, compare, publish.
pub async fn run_once(
    fetcher: Arc<dyn MarketplaceFetcher>,
    config: &RefresherConfig,
    sources: &[MarketplaceSource],
) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    info!("Refresh run {} starting", run_id);

    let enabled = validate(config, sources)?;
    let artifacts = execute(fetcher, config, &enabled).await?;

    info!("[{:?}] Checking against committed catalog", RunPhase::Comparing);
    let repo_path = PathBuf::from(resolve_path(&config.repo_path));
    let outcome = crate::publish::publish(config, &repo_path, &artifacts.index, &artifacts.listing)?;

    let (published, commit) = match outcome {
        PublishOutcome::Published { commit } => {
            info!("[{:?}] Pushed {}", RunPhase::Publishing, commit);
            (true, Some(commit))
        }
        PublishOutcome::NoChange => {
            info!("[{:?}] Nothing to publish", RunPhase::NoOp);
            (false, None)
        }
    };

    let failed = artifacts
        .outcomes
        .iter()
        .filter(|o| o.result.is_err())
        .count();

    let summary = RunSummary {
        run_id,
        started_at: started_at.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
        sources_total: artifacts.outcomes.len(),
        sources_failed: failed,
        skills_total: artifacts.catalog.total,
        published,
        commit,
    };

    info!(
        "[{:?}] Run {} done: {} skills, {}/{} sources failed, published={}",
        RunPhase::Done,
        summary.run_id,
        summary.skills_total,
        summary.sources_failed,
        summary.sources_total,
        summary.published
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{default_config, SkillCandidate, SourceError, SourceFormat};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Fetcher serving canned per-source results.
    struct CannedFetcher {
        responses: HashMap<String, Result<Vec<SkillCandidate>, String>>,
    }

    #[async_trait]
    impl MarketplaceFetcher for CannedFetcher {
        async fn fetch_source(
            &self,
            source: &MarketplaceSource,
        ) -> Result<Vec<SkillCandidate>, SourceError> {
            match self.responses.get(&source.id) {
                Some(Ok(candidates)) => Ok(candidates.clone()),
                Some(Err(message)) => Err(SourceError::Request(message.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn source(id: &str, priority: u32) -> MarketplaceSource {
        MarketplaceSource {
            id: id.to_string(),
            endpoint: format!("https://example.com/{}", id),
            format: SourceFormat::Json,
            enabled: true,
            priority,
            timeout_secs: 5,
        }
    }

    fn candidate(name: &str) -> SkillCandidate {
        SkillCandidate {
            name: name.to_string(),
            description: "write documentation".to_string(),
            link: format!("https://example.com/{}", name),
            category: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_validate_rejects_empty_source_list() {
        let config = default_config();
        let sources = vec![MarketplaceSource {
            enabled: false,
            ..source("off", 10)
        }];
        assert!(validate(&config, &sources).is_err());
    }

    #[test]
    fn test_validate_requires_credential_for_https_remote() {
        let mut config = default_config();
        config.remote_url = "https://github.com/o/r.git".to_string();
        config.credential_env = "SKILLFEED_TEST_MISSING_CREDENTIAL".to_string();

        let sources = vec![source("alpha", 10)];
        let err = validate(&config, &sources).unwrap_err();
        assert!(format!("{:#}", err).contains("SKILLFEED_TEST_MISSING_CREDENTIAL"));
    }

    #[test]
    fn test_validate_allows_local_remote_without_credential() {
        let mut config = default_config();
        config.remote_url = "/srv/catalog.git".to_string();
        let sources = vec![source("alpha", 10)];
        assert!(validate(&config, &sources).is_ok());
    }

    #[tokio::test]
    async fn test_execute_survives_partial_source_failure() {
        let mut responses = HashMap::new();
        responses.insert(
            "alpha".to_string(),
            Ok(vec![candidate("a1"), candidate("a2")]),
        );
        responses.insert("beta".to_string(), Err("connection refused".to_string()));
        responses.insert("gamma".to_string(), Ok(vec![candidate("g1")]));

        let config = default_config();
        let sources = vec![source("alpha", 10), source("beta", 20), source("gamma", 30)];

        let artifacts = execute(Arc::new(CannedFetcher { responses }), &config, &sources)
            .await
            .unwrap();

        assert_eq!(artifacts.catalog.total, 3);
        assert_eq!(
            artifacts
                .outcomes
                .iter()
                .filter(|o| o.result.is_err())
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_execute_fails_when_every_source_fails() {
        let mut responses = HashMap::new();
        responses.insert("alpha".to_string(), Err("down".to_string()));
        responses.insert("beta".to_string(), Err("down".to_string()));

        let config = default_config();
        let sources = vec![source("alpha", 10), source("beta", 20)];

        let result = execute(Arc::new(CannedFetcher { responses }), &config, &sources).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_index_total_matches_catalog() {
        let mut responses = HashMap::new();
        responses.insert(
            "alpha".to_string(),
            Ok(vec![candidate("a"), candidate("b")]),
        );

        let config = default_config();
        let sources = vec![source("alpha", 10)];

        let artifacts = execute(Arc::new(CannedFetcher { responses }), &config, &sources)
            .await
            .unwrap();

        assert_eq!(artifacts.index.total_count, 2);
        assert!(artifacts.index.content.contains("**2** skills"));
        assert_eq!(artifacts.listing.total_count, 2);
    }

    #[tokio::test]
    async fn test_run_once_publishes_then_noops() {
        use std::process::Command;

        let root = tempfile::tempdir().unwrap();
        let bare = root.path().join("remote.git");
        let work = root.path().join("checkout");

        let run = |dir: &std::path::Path, args: &[&str]| {
            let output = Command::new("git").arg("-C").arg(dir).args(args).output().unwrap();
            assert!(output.status.success(), "git {:?} failed", args);
        };
        assert!(Command::new("git")
            .args(["init", "-q", "--bare"])
            .arg(&bare)
            .output()
            .unwrap()
            .status
            .success());
        assert!(Command::new("git")
            .args(["init", "-q", "-b", "main"])
            .arg(&work)
            .output()
            .unwrap()
            .status
            .success());
        run(&work, &["config", "user.name", "test"]);
        run(&work, &["config", "user.email", "test@example.com"]);
        std::fs::write(work.join(".gitkeep"), "").unwrap();
        run(&work, &["add", "."]);
        run(&work, &["commit", "-q", "-m", "initial"]);

        let mut config = default_config();
        config.repo_path = work.to_string_lossy().to_string();
        config.remote_url = bare.to_string_lossy().to_string();
        config.credential_env = "SKILLFEED_TEST_UNSET_TOKEN".to_string();

        let sources = vec![source("alpha", 10)];
        let mut responses = HashMap::new();
        responses.insert("alpha".to_string(), Ok(vec![candidate("a")]));
        let fetcher = Arc::new(CannedFetcher { responses });

        // First run publishes.
        let summary = run_once(Arc::clone(&fetcher) as Arc<dyn MarketplaceFetcher>, &config, &sources)
            .await
            .unwrap();
        assert!(summary.published);
        assert_eq!(summary.skills_total, 1);

        // Second run sees identical content and does nothing.
        let summary = run_once(fetcher, &config, &sources).await.unwrap();
        assert!(!summary.published);
        assert!(summary.commit.is_none());
    }
}
