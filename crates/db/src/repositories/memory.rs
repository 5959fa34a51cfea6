//! In-memory repository implementations. Used by tests and by deployments
//! that have not attached durable storage; the contracts match the SQL
//! implementations, including decision atomicity (the write lock spans the
//! status check and the write).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use maitred_core::autonomy::AutonomySettings;
use maitred_core::domain::approval::{ApprovalItemId, ApprovalOutcome, ApprovalQueueItem};
use maitred_core::domain::cache::CacheEntry;
use maitred_core::domain::message::{ConversationId, Message};

use super::{
    ApprovalQueueRepository, MessageRepository, RepositoryError, ResponseCacheRepository,
    SettingsRepository,
};

#[derive(Default)]
pub struct InMemoryResponseCacheRepository {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

#[async_trait::async_trait]
impl ResponseCacheRepository for InMemoryResponseCacheRepository {
    async fn find_live(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(fingerprint).filter(|entry| entry.is_live(now)).cloned())
    }

    async fn record_hit(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(fingerprint) {
            entry.hit_count += 1;
            entry.last_hit_at = Some(now);
        }
        Ok(())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.query_fingerprint) {
            Some(existing) => {
                existing.query_text = entry.query_text;
                existing.response = entry.response;
                existing.intent = entry.intent;
                existing.expires_at = entry.expires_at;
            }
            None => {
                entries.insert(entry.query_fingerprint.clone(), entry);
            }
        }
        Ok(())
    }

    async fn prune(&self, now: DateTime<Utc>, max_entries: u32) -> Result<u64, RepositoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));

        let overflow = entries.len().saturating_sub(max_entries as usize);
        if overflow > 0 {
            let mut by_recency: Vec<(String, DateTime<Utc>)> = entries
                .iter()
                .map(|(fingerprint, entry)| (fingerprint.clone(), entry.recency()))
                .collect();
            by_recency.sort_by_key(|(_, recency)| *recency);
            for (fingerprint, _) in by_recency.into_iter().take(overflow) {
                entries.remove(&fingerprint);
            }
        }

        Ok((before - entries.len()) as u64)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.entries.read().await.len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryApprovalQueueRepository {
    items: RwLock<HashMap<String, ApprovalQueueItem>>,
}

#[async_trait::async_trait]
impl ApprovalQueueRepository for InMemoryApprovalQueueRepository {
    async fn enqueue(&self, item: ApprovalQueueItem) -> Result<(), RepositoryError> {
        let mut items = self.items.write().await;
        items.insert(item.id.0.clone(), item);
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ApprovalItemId,
    ) -> Result<Option<ApprovalQueueItem>, RepositoryError> {
        let items = self.items.read().await;
        Ok(items.get(&id.0).cloned())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalQueueItem>, RepositoryError> {
        let items = self.items.read().await;
        let mut pending: Vec<ApprovalQueueItem> = items
            .values()
            .filter(|item| item.status == maitred_core::ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|item| item.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn decide(
        &self,
        id: &ApprovalItemId,
        outcome: ApprovalOutcome,
        decided_by: &str,
        reason: Option<String>,
    ) -> Result<ApprovalQueueItem, RepositoryError> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound(id.0.clone()))?;
        item.decide(outcome, decided_by, reason)?;
        Ok(item.clone())
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<Option<AutonomySettings>>,
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn load(&self) -> Result<Option<AutonomySettings>, RepositoryError> {
        Ok(self.settings.read().await.clone())
    }

    async fn save(&self, settings: &AutonomySettings) -> Result<(), RepositoryError> {
        settings.validate().map_err(RepositoryError::Domain)?;
        *self.settings.write().await = Some(settings.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn recent_history(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut history: Vec<Message> = messages
            .iter()
            .filter(|message| &message.conversation_id == conversation_id)
            .cloned()
            .collect();
        history.sort_by_key(|message| message.created_at);
        let skip = history.len().saturating_sub(limit as usize);
        Ok(history.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use maitred_core::autonomy::ActionType;
    use maitred_core::domain::approval::{
        ApprovalOutcome, ApprovalQueueItem, ApprovalStatus, ProposedAction,
    };
    use maitred_core::domain::cache::CacheEntry;
    use maitred_core::domain::message::ConversationId;

    use super::{InMemoryApprovalQueueRepository, InMemoryResponseCacheRepository};
    use crate::repositories::{
        ApprovalQueueRepository, RepositoryError, ResponseCacheRepository,
    };

    fn entry(fingerprint: &str, ttl_secs: i64) -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            query_fingerprint: fingerprint.to_string(),
            query_text: "where is the gym".to_string(),
            response: "The fitness center is on floor 2.".to_string(),
            intent: None,
            hit_count: 0,
            last_hit_at: None,
            expires_at: now + Duration::seconds(ttl_secs),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn in_memory_cache_hides_expired_entries() {
        let repo = InMemoryResponseCacheRepository::default();
        repo.upsert(entry("fp-1", -1)).await.expect("upsert");

        assert!(repo.find_live("fp-1", Utc::now()).await.expect("find").is_none());
        assert_eq!(repo.count().await.expect("count"), 1);

        repo.prune(Utc::now(), 100).await.expect("prune");
        assert_eq!(repo.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn in_memory_cache_evicts_oldest_recency_over_ceiling() {
        let repo = InMemoryResponseCacheRepository::default();

        let mut old = entry("fp-old", 3600);
        old.created_at = Utc::now() - Duration::hours(2);
        repo.upsert(old).await.expect("upsert");
        repo.upsert(entry("fp-new", 3600)).await.expect("upsert");

        repo.prune(Utc::now(), 1).await.expect("prune");
        assert!(repo.find_live("fp-old", Utc::now()).await.expect("find").is_none());
        assert!(repo.find_live("fp-new", Utc::now()).await.expect("find").is_some());
    }

    #[tokio::test]
    async fn in_memory_queue_enforces_single_decision() {
        let repo = InMemoryApprovalQueueRepository::default();
        let item = ApprovalQueueItem::new(
            ActionType::SendResponse,
            ProposedAction::Response {
                conversation_id: ConversationId("C-1".to_string()),
                content: "Certainly, a rollaway bed will be arranged.".to_string(),
            },
            Some(ConversationId("C-1".to_string())),
            None,
        );
        repo.enqueue(item.clone()).await.expect("enqueue");

        repo.decide(&item.id, ApprovalOutcome::Approve, "staff:ana", None)
            .await
            .expect("approve");
        let error = repo
            .decide(&item.id, ApprovalOutcome::Reject, "staff:ben", Some("no".to_string()))
            .await
            .expect_err("second decision");
        assert!(matches!(error, RepositoryError::Domain(_)));

        let found = repo.find_by_id(&item.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn in_memory_queue_serializes_concurrent_decisions() {
        let repo = InMemoryApprovalQueueRepository::default();
        let item = ApprovalQueueItem::new(
            ActionType::SendResponse,
            ProposedAction::Response {
                conversation_id: ConversationId("C-1".to_string()),
                content: "Certainly, a late checkout is arranged.".to_string(),
            },
            Some(ConversationId("C-1".to_string())),
            None,
        );
        repo.enqueue(item.clone()).await.expect("enqueue");

        // The write lock spans the status check and the write, so one of the
        // racing calls must observe the other's terminal state and fail.
        let approve = repo.decide(&item.id, ApprovalOutcome::Approve, "staff:ana", None);
        let reject = repo.decide(
            &item.id,
            ApprovalOutcome::Reject,
            "staff:ben",
            Some("duplicate request".to_string()),
        );
        let (approve_result, reject_result) = tokio::join!(approve, reject);

        assert!(approve_result.is_ok() ^ reject_result.is_ok());

        let stored = repo.find_by_id(&item.id).await.expect("find").expect("exists");
        if approve_result.is_ok() {
            assert_eq!(stored.status, ApprovalStatus::Approved);
            assert_eq!(stored.decided_by.as_deref(), Some("staff:ana"));
        } else {
            assert_eq!(stored.status, ApprovalStatus::Rejected);
            assert_eq!(stored.decided_by.as_deref(), Some("staff:ben"));
        }
    }
}
