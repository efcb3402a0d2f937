//! Retrieval types and the similarity search collaborator trait.
//!
//! Whatever shape a search service returns, its adapter converts each
//! result into a [`RetrievalHit`] before it reaches the merger, so nothing
//! downstream branches on optional metadata attributes.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk_id: String,
    pub domain: String,
    pub document_id: String,
    pub chunk_index: usize,

    /// Similarity score, higher is more relevant. The scale belongs to the
    /// search collaborator.
    pub score: f32,

    /// Chunk text, filled in by hydration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl RetrievalHit {
    /// The hydrated text, or an empty string before hydration.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Best-first order for similarity scores.
///
/// A total order: higher scores come first, NaN ranks below every number,
/// and `0.0`/`-0.0` compare equal so stable sorts keep their input order.
pub fn score_order(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => (b + 0.0).total_cmp(&(a + 0.0)),
    }
}

/// Which part of the corpus a query targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainSelector {
    /// A single base domain
    Domain(String),
    /// Domain-agnostic: fan out across every base domain
    General,
}

impl DomainSelector {
    /// Interpret a user-facing domain name. `general_name` (and an empty
    /// string) select domain-agnostic mode.
    pub fn parse(value: &str, general_name: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(general_name) {
            Self::General
        } else {
            Self::Domain(value.to_lowercase())
        }
    }

    pub fn is_general(&self) -> bool {
        matches!(self, Self::General)
    }
}

impl std::fmt::Display for DomainSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(d) => write!(f, "{d}"),
            Self::General => write!(f, "general"),
        }
    }
}

/// One bounded search against a single domain.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub domain: String,
    pub vector: Vec<f32>,
    pub top_k: usize,

    /// Restrict results to these documents; empty means no restriction
    pub document_ids: Vec<String>,
}

/// The vector similarity search collaborator.
///
/// Implementations return at most `top_k` hits sorted by descending score.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// The backend name (e.g., "in_memory", "jsonl").
    fn name(&self) -> &str;

    /// Run one bounded search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<RetrievalHit>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_order_puts_nan_last() {
        let mut scores = vec![0.3, f32::NAN, 0.9, -0.5, f32::NAN, 0.0, 0.7];
        scores.sort_by(|a, b| score_order(*a, *b));
        assert_eq!(&scores[..5], &[0.9, 0.7, 0.3, 0.0, -0.5]);
        assert!(scores[5..].iter().all(|s| s.is_nan()));
        assert_eq!(score_order(0.0, -0.0), Ordering::Equal);
    }

    #[test]
    fn general_name_selects_fanout() {
        assert_eq!(DomainSelector::parse("general", "general"), DomainSelector::General);
        assert_eq!(DomainSelector::parse("GENERAL", "general"), DomainSelector::General);
        assert_eq!(DomainSelector::parse("  ", "general"), DomainSelector::General);
    }

    #[test]
    fn named_domain_is_normalized() {
        assert_eq!(
            DomainSelector::parse(" HR ", "general"),
            DomainSelector::Domain("hr".into())
        );
    }

    #[test]
    fn unhydrated_hit_has_empty_text() {
        let hit = RetrievalHit {
            chunk_id: "a:0".into(),
            domain: "it".into(),
            document_id: "a".into(),
            chunk_index: 0,
            score: 0.5,
            text: None,
        };
        assert_eq!(hit.text(), "");
        let json = serde_json::to_string(&hit).unwrap();
        assert!(!json.contains("text"));
    }
}
