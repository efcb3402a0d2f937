//! Retrieval fan-out and merge.
//!
//! A query scoped to one domain goes straight to the search collaborator.
//! A domain-agnostic query takes a bounded quota from every base domain
//! before re-ranking globally, so a domain whose raw scores run high cannot
//! starve the others.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use ragctx_config::RetrievalConfig;
use ragctx_core::error::RetrievalError;
use ragctx_core::{DomainSelector, RetrievalHit, SearchBackend, SearchRequest, score_order};
use tracing::debug;
use uuid::Uuid;

pub struct RetrievalFanoutMerger {
    backend: Arc<dyn SearchBackend>,
    base_domains: Vec<String>,
    per_domain_top_k: usize,
    trace: bool,
}

impl RetrievalFanoutMerger {
    /// Create a merger over `base_domains` (searched in sorted order).
    pub fn new<I, S>(backend: Arc<dyn SearchBackend>, base_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut base_domains: Vec<String> = base_domains.into_iter().map(Into::into).collect();
        base_domains.sort();
        base_domains.dedup();
        Self {
            backend,
            base_domains,
            per_domain_top_k: 0,
            trace: false,
        }
    }

    pub fn from_config(backend: Arc<dyn SearchBackend>, config: &RetrievalConfig) -> Self {
        Self::new(backend, config.base_domains.iter().cloned())
            .with_per_domain_top_k(config.per_domain_top_k)
            .with_trace(config.debug)
    }

    /// Fixed per-domain quota for domain-agnostic queries; 0 derives it
    /// from `top_k`.
    pub fn with_per_domain_top_k(mut self, per_domain_top_k: usize) -> Self {
        self.per_domain_top_k = per_domain_top_k;
        self
    }

    /// Emit a per-query retrieval trace at debug level.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn base_domains(&self) -> &[String] {
        &self.base_domains
    }

    /// Hits requested from each base domain for a domain-agnostic query.
    pub fn per_domain_quota(&self, top_k: usize) -> usize {
        if self.per_domain_top_k > 0 {
            return self.per_domain_top_k;
        }
        top_k.div_ceil(self.base_domains.len().max(1)).max(1)
    }

    /// Retrieve at most `top_k` hits for `vector`.
    ///
    /// `document_ids` restricts a single-domain search; domain-agnostic
    /// searches span whole domains. A failing branch fails the whole call.
    pub async fn retrieve(
        &self,
        vector: &[f32],
        top_k: usize,
        selector: &DomainSelector,
        document_ids: &[String],
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let hits = match selector {
            DomainSelector::Domain(domain) => {
                let mut hits = self
                    .backend
                    .search(SearchRequest {
                        domain: domain.clone(),
                        vector: vector.to_vec(),
                        top_k,
                        document_ids: document_ids.to_vec(),
                    })
                    .await?;
                hits.truncate(top_k);
                hits
            }
            DomainSelector::General => self.fan_out(vector, top_k).await?,
        };

        if self.trace {
            let chunk_ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
            let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
            debug!(
                query_id = %Uuid::new_v4().simple(),
                domain = %selector,
                backend = self.backend.name(),
                top_k,
                ?chunk_ids,
                ?scores,
                latency_ms = started.elapsed().as_secs_f64() * 1000.0,
                "Retrieval trace"
            );
        }

        Ok(hits)
    }

    async fn fan_out(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalHit>, RetrievalError> {
        if self.base_domains.is_empty() {
            return Ok(Vec::new());
        }

        let quota = self.per_domain_quota(top_k);
        let searches = self.base_domains.iter().map(|domain| {
            self.backend.search(SearchRequest {
                domain: domain.clone(),
                vector: vector.to_vec(),
                top_k: quota,
                document_ids: Vec::new(),
            })
        });

        let per_domain = try_join_all(searches).await?;
        debug!(
            domains = self.base_domains.len(),
            quota,
            fetched = per_domain.iter().map(Vec::len).sum::<usize>(),
            "Fan-out complete"
        );

        Ok(merge_ranked(per_domain, top_k))
    }
}

/// Concatenate ranked lists, stable-sort by descending score and keep the
/// first `top_k`. Ties keep their concatenation order; NaN scores sort
/// after every finite score.
pub fn merge_ranked(lists: Vec<Vec<RetrievalHit>>, top_k: usize) -> Vec<RetrievalHit> {
    let mut merged: Vec<RetrievalHit> = lists.into_iter().flatten().collect();
    merged.sort_by(|a, b| score_order(a.score, b.score));
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedSearch, hit};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn four_domains() -> ScriptedSearch {
        ScriptedSearch::new()
            .with_domain("hr", vec![hit("hr", "h", 0, 0.95), hit("hr", "h", 1, 0.90), hit("hr", "h", 2, 0.89)])
            .with_domain("it", vec![hit("it", "i", 0, 0.40), hit("it", "i", 1, 0.35)])
            .with_domain("rpa", vec![hit("rpa", "r", 0, 0.70), hit("rpa", "r", 1, 0.20)])
            .with_domain("security", vec![hit("security", "s", 0, 0.60), hit("security", "s", 1, 0.55)])
    }

    fn merger(backend: Arc<ScriptedSearch>) -> RetrievalFanoutMerger {
        RetrievalFanoutMerger::new(backend, ["security", "it", "rpa", "hr"])
    }

    #[test]
    fn quota_is_ceiling_of_top_k_over_domains() {
        let m = merger(Arc::new(ScriptedSearch::new()));
        assert_eq!(m.per_domain_quota(5), 2);
        assert_eq!(m.per_domain_quota(8), 2);
        assert_eq!(m.per_domain_quota(9), 3);
        assert_eq!(m.per_domain_quota(1), 1);
    }

    #[test]
    fn quota_override_wins() {
        let m = merger(Arc::new(ScriptedSearch::new())).with_per_domain_top_k(4);
        assert_eq!(m.per_domain_quota(5), 4);
    }

    #[tokio::test]
    async fn general_query_fans_out_and_keeps_best() {
        let backend = Arc::new(four_domains());
        let m = merger(backend.clone());

        let hits = m.retrieve(&[1.0], 5, &DomainSelector::General, &[]).await.unwrap();

        let requests = backend.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r.top_k == 2));

        // hr's third hit (0.89) is outside the quota even though it outranks others.
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.95, 0.90, 0.70, 0.60, 0.55]);
    }

    #[tokio::test]
    async fn merged_length_is_bounded_by_available_hits() {
        let backend = Arc::new(
            ScriptedSearch::new()
                .with_domain("hr", vec![hit("hr", "h", 0, 0.3)])
                .with_domain("it", vec![hit("it", "i", 0, 0.8)]),
        );
        let hits = merger(backend)
            .retrieve(&[1.0], 5, &DomainSelector::General, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].domain, "it");
    }

    #[tokio::test]
    async fn ties_keep_domain_order() {
        let backend = Arc::new(
            ScriptedSearch::new()
                .with_domain("hr", vec![hit("hr", "h", 0, 0.5)])
                .with_domain("it", vec![hit("it", "i", 0, 0.5)])
                .with_domain("security", vec![hit("security", "s", 0, 0.5)]),
        );
        let hits = merger(backend)
            .retrieve(&[1.0], 3, &DomainSelector::General, &[])
            .await
            .unwrap();
        let domains: Vec<&str> = hits.iter().map(|h| h.domain.as_str()).collect();
        assert_eq!(domains, vec!["hr", "it", "security"]);
    }

    #[tokio::test]
    async fn single_domain_keeps_collaborator_order_and_filter() {
        let backend = Arc::new(ScriptedSearch::new().with_domain(
            "it",
            vec![hit("it", "a", 0, 0.9), hit("it", "b", 0, 0.8), hit("it", "a", 1, 0.7)],
        ));
        let hits = merger(backend.clone())
            .retrieve(&[1.0], 5, &DomainSelector::Domain("it".into()), &["a".to_string()])
            .await
            .unwrap();

        assert_eq!(backend.request_count(), 1);
        let request = backend.requests.lock().unwrap()[0].clone();
        assert_eq!(request.top_k, 5);
        assert_eq!(request.document_ids, vec!["a".to_string()]);

        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a:0", "a:1"]);
    }

    #[tokio::test]
    async fn zero_top_k_issues_no_search() {
        let backend = Arc::new(four_domains());
        let hits = merger(backend.clone())
            .retrieve(&[1.0], 0, &DomainSelector::General, &[])
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn no_hits_anywhere_is_empty_not_error() {
        let hits = merger(Arc::new(ScriptedSearch::new()))
            .retrieve(&[1.0], 5, &DomainSelector::General, &[])
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn failing_branch_fails_the_call() {
        let backend = Arc::new(four_domains().failing_on("rpa"));
        let err = merger(backend)
            .retrieve(&[1.0], 5, &DomainSelector::General, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::SearchFailed { ref domain, .. } if domain == "rpa"));
    }

    struct RendezvousSearch {
        barrier: Barrier,
    }

    #[async_trait]
    impl SearchBackend for RendezvousSearch {
        fn name(&self) -> &str {
            "rendezvous"
        }

        async fn search(&self, request: SearchRequest) -> Result<Vec<RetrievalHit>, RetrievalError> {
            // Only completes if every domain's search is in flight at once.
            self.barrier.wait().await;
            Ok(vec![hit(&request.domain, &request.domain, 0, 0.5)])
        }
    }

    #[tokio::test]
    async fn branches_run_concurrently() {
        let backend = Arc::new(RendezvousSearch {
            barrier: Barrier::new(4),
        });
        let m = RetrievalFanoutMerger::new(backend, ["hr", "it", "rpa", "security"]);
        let hits = tokio::time::timeout(
            Duration::from_secs(5),
            m.retrieve(&[1.0], 4, &DomainSelector::General, &[]),
        )
        .await
        .expect("fan-out searches should run concurrently")
        .unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn merge_sorts_descending_and_truncates() {
        let merged = merge_ranked(
            vec![
                vec![hit("a", "a", 0, 0.2), hit("a", "a", 1, 0.1)],
                vec![hit("b", "b", 0, 0.9), hit("b", "b", 1, f32::NAN)],
            ],
            3,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].score, 0.9);
        assert_eq!(merged[1].score, 0.2);
    }

    #[test]
    fn merge_with_scattered_nan_scores_stays_sorted() {
        let lists: Vec<Vec<RetrievalHit>> = ["hr", "it", "rpa", "security"]
            .iter()
            .enumerate()
            .map(|(d, domain)| {
                (0..200)
                    .map(|i| {
                        let n = d * 200 + i;
                        let score = if n % 7 == 0 { f32::NAN } else { ((n * 37) % 101) as f32 / 100.0 };
                        hit(domain, domain, i, score)
                    })
                    .collect()
            })
            .collect();

        let merged = merge_ranked(lists, 800);
        assert_eq!(merged.len(), 800);

        let finite = merged.iter().take_while(|h| !h.score.is_nan()).count();
        assert!(merged[finite..].iter().all(|h| h.score.is_nan()));
        assert_eq!(merged.len() - finite, (0..800).filter(|n| n % 7 == 0).count());
        assert!(merged[..finite].windows(2).all(|w| w[0].score >= w[1].score));
    }
}
