use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use maitred_core::autonomy::AutonomySettings;
use maitred_core::domain::approval::{ApprovalItemId, ApprovalOutcome, ApprovalQueueItem};
use maitred_core::domain::cache::CacheEntry;
use maitred_core::domain::message::{ConversationId, Message};
use maitred_core::errors::DomainError;

pub mod approval_queue;
pub mod cache;
pub mod memory;
pub mod message;
pub mod settings;

pub use approval_queue::SqlApprovalQueueRepository;
pub use cache::SqlResponseCacheRepository;
pub use memory::{
    InMemoryApprovalQueueRepository, InMemoryMessageRepository, InMemoryResponseCacheRepository,
    InMemorySettingsRepository,
};
pub use message::SqlMessageRepository;
pub use settings::SqlSettingsRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("approval item `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[async_trait]
pub trait ResponseCacheRepository: Send + Sync {
    /// Entry for the fingerprint if one exists and is not expired. Expired
    /// rows are invisible here even before a prune pass removes them.
    async fn find_live(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError>;

    /// Increments hit statistics for a fingerprint. No-op if absent.
    async fn record_hit(&self, fingerprint: &str, now: DateTime<Utc>)
        -> Result<(), RepositoryError>;

    /// Upserts by fingerprint. On conflict the response, intent, diagnostic
    /// text and expiry are refreshed; hit statistics and creation time are
    /// preserved.
    async fn upsert(&self, entry: CacheEntry) -> Result<(), RepositoryError>;

    /// Deletes expired entries, then evicts oldest-by-recency entries until
    /// the count is at or under `max_entries`. Returns rows removed.
    async fn prune(&self, now: DateTime<Utc>, max_entries: u32) -> Result<u64, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ApprovalQueueRepository: Send + Sync {
    async fn enqueue(&self, item: ApprovalQueueItem) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        id: &ApprovalItemId,
    ) -> Result<Option<ApprovalQueueItem>, RepositoryError>;

    /// Pending items, oldest first, for the staff review surface.
    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalQueueItem>, RepositoryError>;

    /// Applies a staff decision atomically: the status write is guarded on
    /// the item still being pending, so a concurrent second decision fails
    /// instead of overwriting the first.
    async fn decide(
        &self,
        id: &ApprovalItemId,
        outcome: ApprovalOutcome,
        decided_by: &str,
        reason: Option<String>,
    ) -> Result<ApprovalQueueItem, RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self) -> Result<Option<AutonomySettings>, RepositoryError>;

    /// Full replace of the singleton document.
    async fn save(&self, settings: &AutonomySettings) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: Message) -> Result<(), RepositoryError>;

    /// The most recent `limit` messages in chronological order, as the
    /// prompt assembler expects.
    async fn recent_history(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
}
