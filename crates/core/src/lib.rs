//! # ragctx core
//!
//! Domain types, collaborator traits, and error definitions for the ragctx
//! context assembly pipeline. This crate carries no runtime or I/O
//! dependencies; embedders, search services, stores and tokenizers are
//! traits here and implemented in other crates.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod message;
pub mod retrieval;
pub mod store;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use chunk::{Chunk, DocumentText};
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use message::{ConversationTurn, Role};
pub use retrieval::{DomainSelector, RetrievalHit, SearchBackend, SearchRequest, score_order};
pub use store::{ChunkStore, IndexedVector, VectorIndex};
pub use tokenizer::Tokenizer;
