//! Document and chunk types produced at ingestion time.

use serde::{Deserialize, Serialize};

/// Extracted plain text of an externally owned document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentText {
    /// Document identifier (owned by the upload/storage collaborator)
    pub id: String,

    /// Base domain the document was ingested under
    pub domain: String,

    /// Extracted plain text
    pub text: String,
}

impl DocumentText {
    pub fn new(id: impl Into<String>, domain: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            text: text.into(),
        }
    }
}

/// A token-bounded contiguous slice of a document's text.
///
/// `token_count <= chunk_size_tokens` holds for every chunk except one made
/// of a single word that alone exceeds the limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id, see [`Chunk::make_id`]
    pub chunk_id: String,

    /// Owning document
    pub document_id: String,

    /// Base domain of the owning document
    pub domain: String,

    /// Zero-based, contiguous position within the document
    pub chunk_index: usize,

    /// Non-empty, trimmed text
    pub text: String,

    /// Token count measured when the chunk was created
    pub token_count: usize,
}

impl Chunk {
    /// Build the deterministic chunk id for a document and sequence index.
    pub fn make_id(document_id: &str, chunk_index: usize) -> String {
        format!("{document_id}:{chunk_index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_document_and_index() {
        assert_eq!(Chunk::make_id("doc-7", 3), "doc-7:3");
    }

    #[test]
    fn chunk_serialization() {
        let chunk = Chunk {
            chunk_id: Chunk::make_id("d", 0),
            document_id: "d".into(),
            domain: "hr".into(),
            chunk_index: 0,
            text: "Leave policy applies to all staff.".into(),
            token_count: 6,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("d:0"));
        assert!(json.contains("Leave policy"));
    }
}
