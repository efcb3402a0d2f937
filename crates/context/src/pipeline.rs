//! Query-time context assembly.
//!
//! embed → fan-out/merge → relevance floor → hydrate → token budget.

use std::sync::Arc;
use std::time::Instant;

use ragctx_config::{AppConfig, PromptConfig};
use ragctx_core::error::{EmbeddingError, RetrievalError, StoreError};
use ragctx_core::{ChunkStore, ConversationTurn, DomainSelector, Embedder, RetrievalHit, SearchBackend};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::budget::{TokenBudgetEnforcer, TokenUsage};
use crate::fanout::RetrievalFanoutMerger;
use crate::relevance::RelevanceFilter;
use crate::token::TokenCounter;

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Too many document ids: {got} (max {max})")]
    TooManyDocuments { got: usize, max: usize },

    #[error("Unknown domain '{0}'")]
    UnknownDomain(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One chat turn's worth of inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRequest {
    /// A base domain, or the general domain name for a domain-agnostic query
    pub domain: String,
    /// Empty selects the configured prompt for the request's domain
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    pub user_message: String,
    /// Restrict retrieval to these documents (single-domain queries only)
    #[serde(default)]
    pub document_ids: Vec<String>,
}

/// Citation for one record that made it into the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: String,
    pub document_id: String,
    pub domain: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text_preview: String,
}

impl SourceRef {
    fn from_hit(hit: &RetrievalHit) -> Self {
        Self {
            chunk_id: hit.chunk_id.clone(),
            document_id: hit.document_id.clone(),
            domain: hit.domain.clone(),
            chunk_index: hit.chunk_index,
            score: hit.score,
            text_preview: hit.text().chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

/// Everything the generation collaborator needs, already within budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub user_message: String,
    /// The user message framed with the kept context, ready to send
    pub final_user_message: String,
    pub records: Vec<RetrievalHit>,
    /// Record texts separated by blank lines; `None` when nothing was kept
    pub context_text: Option<String>,
    pub sources: Vec<SourceRef>,
    pub usage: TokenUsage,
    pub max_output_tokens: usize,
    pub average_score: Option<f32>,
}

pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    merger: RetrievalFanoutMerger,
    filter: RelevanceFilter,
    enforcer: TokenBudgetEnforcer,
    store: Arc<dyn ChunkStore>,
    prompts: PromptConfig,
    top_k: usize,
    general_domain: String,
    max_document_filter: usize,
}

impl QueryPipeline {
    pub fn from_config(
        config: &AppConfig,
        counter: TokenCounter,
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn ChunkStore>,
    ) -> Self {
        Self {
            embedder,
            merger: RetrievalFanoutMerger::from_config(backend, &config.retrieval),
            filter: RelevanceFilter::new(config.retrieval.min_score),
            enforcer: TokenBudgetEnforcer::from_config(counter, &config.budget),
            store,
            prompts: config.prompts.clone(),
            top_k: config.retrieval.top_k,
            general_domain: config.retrieval.general_domain.clone(),
            max_document_filter: config.retrieval.max_document_filter,
        }
    }

    fn selector(&self, domain: &str) -> Result<DomainSelector, PipelineError> {
        let selector = DomainSelector::parse(domain, &self.general_domain);
        if let DomainSelector::Domain(name) = &selector
            && !self.merger.base_domains().contains(name)
        {
            return Err(PipelineError::UnknownDomain(name.clone()));
        }
        Ok(selector)
    }

    pub async fn assemble(&self, request: ContextRequest) -> Result<AssembledContext, PipelineError> {
        if request.document_ids.len() > self.max_document_filter {
            return Err(PipelineError::TooManyDocuments {
                got: request.document_ids.len(),
                max: self.max_document_filter,
            });
        }
        let selector = self.selector(&request.domain)?;
        let started = Instant::now();

        let system_prompt = if request.system_prompt.trim().is_empty() {
            let key = match &selector {
                DomainSelector::Domain(name) => name.as_str(),
                DomainSelector::General => self.general_domain.as_str(),
            };
            self.prompts.system_prompt(key)
        } else {
            request.system_prompt
        };

        let vector = if request.user_message.trim().is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_query(&request.user_message).await?
        };

        let records = if vector.is_empty() {
            debug!("Empty query vector, skipping retrieval");
            Vec::new()
        } else {
            let hits = self
                .merger
                .retrieve(&vector, self.top_k, &selector, &request.document_ids)
                .await?;
            let hits = self.filter.apply(hits);
            hydrate(self.store.as_ref(), hits).await?
        };

        let outcome = self.enforcer.enforce_input_budget(
            &system_prompt,
            &request.history,
            &request.user_message,
            &records,
        );

        let sources: Vec<SourceRef> = outcome.records.iter().map(SourceRef::from_hit).collect();
        let context_text = if outcome.records.is_empty() {
            None
        } else {
            Some(
                outcome
                    .records
                    .iter()
                    .map(|r| r.text())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };
        let average_score = if sources.is_empty() {
            None
        } else {
            Some(sources.iter().map(|s| s.score).sum::<f32>() / sources.len() as f32)
        };

        info!(
            domain = %selector,
            retrieved = records.len(),
            kept = outcome.records.len(),
            history_turns = outcome.history.len(),
            total_tokens = outcome.usage.total_tokens,
            max_input_tokens = outcome.usage.max_input_tokens,
            latency_ms = started.elapsed().as_millis() as u64,
            "Context assembled"
        );

        let final_user_message = frame_user_message(&request.user_message, context_text.as_deref());

        Ok(AssembledContext {
            system_prompt,
            history: outcome.history,
            user_message: request.user_message,
            final_user_message,
            records: outcome.records,
            context_text,
            sources,
            usage: outcome.usage,
            max_output_tokens: self.enforcer.budget().max_output_tokens,
            average_score,
        })
    }
}

/// Frame the user message with retrieved context. Without context the
/// message is returned unchanged.
pub fn frame_user_message(user_message: &str, context_text: Option<&str>) -> String {
    match context_text {
        Some(context) if !context.is_empty() => format!("Context:\n{context}\n\nQuestion:\n{user_message}"),
        _ => user_message.to_string(),
    }
}

/// Attach chunk text to ranked hits. Hits whose id the store does not know
/// are dropped; the order of the rest is kept.
pub async fn hydrate(store: &dyn ChunkStore, hits: Vec<RetrievalHit>) -> Result<Vec<RetrievalHit>, StoreError> {
    if hits.is_empty() {
        return Ok(hits);
    }

    let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
    let mut found = store.get_by_ids(&ids).await?;

    let before = hits.len();
    let hydrated: Vec<RetrievalHit> = hits
        .into_iter()
        .filter_map(|mut hit| {
            let chunk = found.remove(&hit.chunk_id)?;
            hit.text = Some(chunk.text);
            Some(hit)
        })
        .collect();

    if hydrated.len() < before {
        debug!(missing = before - hydrated.len(), "Dropped hits without stored chunks");
    }
    Ok(hydrated)
}
