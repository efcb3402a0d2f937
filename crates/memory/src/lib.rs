//! Reference collaborator implementations for ragctx: an in-memory vector
//! index and chunk store, and a JSONL file-backed variant of the same.

pub mod file_backend;
pub mod in_memory;
pub mod vector;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use vector::{cosine_similarity, rank_by_similarity};
