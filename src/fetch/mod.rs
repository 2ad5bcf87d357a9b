//! Marketplace Source Reader
//!
//! Fetches raw skill candidates from every enabled marketplace source.
//! Individual source failures are captured per-source and never abort
//! the run; the aggregator simply sees fewer candidates that cycle.

pub mod client;
pub mod payload;
pub mod repo_scan;
pub mod skill_md;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::types::{MarketplaceFetcher, MarketplaceSource, SourceOutcome};

/// Fetch all sources with a bounded fan-out.
///
/// At most `max_concurrent` fetches are in flight at once. Results are
/// returned in the order of `sources`, regardless of completion order,
/// so downstream aggregation stays deterministic.
pub async fn fetch_all(
    fetcher: Arc<dyn MarketplaceFetcher>,
    sources: &[MarketplaceSource],
    max_concurrent: usize,
) -> Vec<SourceOutcome> {
    let limit = max_concurrent.max(1);

    let mut slots: Vec<Option<SourceOutcome>> = Vec::with_capacity(sources.len());
    slots.resize_with(sources.len(), || None);

    let mut tasks: JoinSet<(usize, SourceOutcome)> = JoinSet::new();
    let mut next = 0usize;

    while next < sources.len() || !tasks.is_empty() {
        // Top up the in-flight set.
        while next < sources.len() && tasks.len() < limit {
            let source = sources[next].clone();
            let fetcher = Arc::clone(&fetcher);
            let idx = next;
            tasks.spawn(async move {
                let source_id = source.id.clone();
                let result = fetcher.fetch_source(&source).await;
                (idx, SourceOutcome { source_id, result })
            });
            next += 1;
        }

        match tasks.join_next().await {
            Some(Ok((idx, outcome))) => {
                match &outcome.result {
                    Ok(candidates) => info!(
                        "Fetched {} candidates from source '{}'",
                        candidates.len(),
                        outcome.source_id
                    ),
                    Err(e) => warn!("Source '{}' failed: {}", outcome.source_id, e),
                }
                slots[idx] = Some(outcome);
            }
            Some(Err(e)) => error!("Fetch task panicked: {}", e),
            None => break,
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SkillCandidate, SourceError, SourceFormat};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Canned fetcher: earlier sources answer slower, so completion
    /// order is the reverse of input order.
    struct SlowFirstFetcher;

    #[async_trait]
    impl MarketplaceFetcher for SlowFirstFetcher {
        async fn fetch_source(
            &self,
            source: &MarketplaceSource,
        ) -> Result<Vec<SkillCandidate>, SourceError> {
            let delay = match source.id.as_str() {
                "first" => 50,
                "second" => 20,
                _ => 1,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if source.id == "broken" {
                return Err(SourceError::Request("connection refused".to_string()));
            }

            Ok(vec![SkillCandidate {
                name: format!("{}-skill", source.id),
                description: "a skill".to_string(),
                link: format!("https://example.com/{}", source.id),
                category: None,
                tags: Vec::new(),
            }])
        }
    }

    fn source(id: &str) -> MarketplaceSource {
        MarketplaceSource {
            id: id.to_string(),
            endpoint: format!("https://example.com/{}", id),
            format: SourceFormat::Json,
            enabled: true,
            priority: 10,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_results_keep_input_order_despite_completion_order() {
        let sources = vec![source("first"), source("second"), source("third")];
        let outcomes = fetch_all(Arc::new(SlowFirstFetcher), &sources, 3).await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.source_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failed_source_is_reported_not_fatal() {
        let sources = vec![source("first"), source("broken"), source("third")];
        let outcomes = fetch_all(Arc::new(SlowFirstFetcher), &sources, 2).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_bounded_to_single_worker_still_completes() {
        let sources = vec![source("first"), source("second"), source("third")];
        let outcomes = fetch_all(Arc::new(SlowFirstFetcher), &sources, 1).await;
        assert_eq!(outcomes.len(), 3);
    }
}
