use serde::{Deserialize, Serialize};

use crate::domain::classification::ClassificationResult;

/// Token accounting reported by the completion provider for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Reference to a knowledge match that grounded a response. Only the id,
/// title and score survive into metadata; the full content does not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRef {
    pub id: String,
    pub title: String,
    pub similarity: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub cached: bool,
    pub classification: Option<ClassificationResult>,
    pub knowledge: Vec<KnowledgeRef>,
    pub usage: Option<ProviderUsage>,
    pub guest_summary: Option<String>,
}

/// The generator's output. Persisting the outbound message is the
/// conversation collaborator's job, not the core's.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub content: String,
    pub confidence: f32,
    pub intent: Option<String>,
    pub metadata: ResponseMetadata,
}

impl GeneratedResponse {
    /// Confidence assigned to cache-served responses.
    pub const CACHE_HIT_CONFIDENCE: f32 = 0.9;

    pub fn from_cache(content: String, intent: Option<String>) -> Self {
        Self {
            content,
            confidence: Self::CACHE_HIT_CONFIDENCE,
            intent,
            metadata: ResponseMetadata { cached: true, ..ResponseMetadata::default() },
        }
    }
}
