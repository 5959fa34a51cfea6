//! Collaborator seams for the response pipeline. The pipeline owns none of
//! these implementations: completion, retrieval, classification, and task
//! creation are pluggable backends resolved elsewhere. Per-call timeouts are
//! the provider implementation's responsibility.

use anyhow::Result;
use async_trait::async_trait;

use maitred_core::domain::classification::ClassificationResult;
use maitred_core::domain::knowledge::KnowledgeMatch;
use maitred_core::domain::response::ProviderUsage;
use maitred_core::domain::task::NewServiceTask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: ProviderUsage,
}

/// The expensive, externally metered call. Invoked at most once per
/// `generate`, and not at all on a cache hit.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion>;
}

#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
    pub limit: u32,
    pub min_similarity: f32,
}

#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<KnowledgeMatch>>;
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;
}

/// Where auto-approved (or staff-approved) service tasks are created.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn create_task(&self, task: NewServiceTask) -> Result<()>;
}
