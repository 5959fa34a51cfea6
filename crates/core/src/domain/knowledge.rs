use serde::{Deserialize, Serialize};

/// A ranked knowledge-base snippet returned by the embedding-capable
/// retriever. Ephemeral: produced per query, referenced by id in response
/// metadata, never persisted by the core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub id: String,
    pub title: String,
    pub content: String,
    pub similarity: f32,
}
