//! # ragctx context
//!
//! Turns documents into token-bounded chunks at ingestion time, and at query
//! time turns a user message plus conversation history into a bounded
//! prompt context: fan-out retrieval across domains, a relevance floor,
//! hydration, and token budget enforcement.

pub mod budget;
pub mod chunker;
pub mod fanout;
pub mod ingest;
pub mod pipeline;
pub mod relevance;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use budget::{BudgetOutcome, DropCategory, DropInfo, DropReason, TokenBudget, TokenBudgetEnforcer, TokenUsage};
pub use chunker::SentenceChunker;
pub use fanout::{RetrievalFanoutMerger, merge_ranked};
pub use ingest::{IngestError, IngestPipeline, IngestReport};
pub use pipeline::{AssembledContext, ContextRequest, PipelineError, QueryPipeline, SourceRef, frame_user_message, hydrate};
pub use relevance::RelevanceFilter;
pub use token::{TokenCounter, TokenizerHandle, whitespace_count};
