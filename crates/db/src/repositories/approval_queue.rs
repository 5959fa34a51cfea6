use chrono::{DateTime, Utc};
use sqlx::Row;

use maitred_core::autonomy::ActionType;
use maitred_core::domain::approval::{
    ApprovalItemId, ApprovalItemKind, ApprovalOutcome, ApprovalQueueItem, ApprovalStatus,
    ProposedAction,
};
use maitred_core::domain::guest::GuestId;
use maitred_core::domain::message::ConversationId;

use super::{ApprovalQueueRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalQueueRepository {
    pool: DbPool,
}

impl SqlApprovalQueueRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalQueueItem, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_raw: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_type_raw: String =
        row.try_get("action_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_data: String =
        row.try_get("action_data").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: Option<String> =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let guest_id: Option<String> =
        row.try_get("guest_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_raw: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decided_at_raw: Option<String> =
        row.try_get("decided_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decided_by: Option<String> =
        row.try_get("decided_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rejection_reason: Option<String> =
        row.try_get("rejection_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = ApprovalItemKind::parse(&kind_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown approval kind `{kind_raw}`")))?;
    let action_type = ActionType::parse(&action_type_raw).map_err(RepositoryError::Domain)?;
    // The opaque payload is validated against the typed shape on decode.
    let action: ProposedAction = serde_json::from_str(&action_data)
        .map_err(|e| RepositoryError::Decode(format!("bad action payload: {e}")))?;
    let status = ApprovalStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_raw}`")))?;

    Ok(ApprovalQueueItem {
        id: ApprovalItemId(id),
        kind,
        action_type,
        action,
        conversation_id: conversation_id.map(ConversationId),
        guest_id: guest_id.map(GuestId),
        status,
        decided_at: decided_at_raw.as_deref().map(parse_timestamp).transpose()?,
        decided_by,
        rejection_reason,
        created_at: parse_timestamp(&created_at_raw)?,
    })
}

const SELECT_COLUMNS: &str = "id, kind, action_type, action_data, conversation_id, guest_id,
                              status, decided_at, decided_by, rejection_reason, created_at";

#[async_trait::async_trait]
impl ApprovalQueueRepository for SqlApprovalQueueRepository {
    async fn enqueue(&self, item: ApprovalQueueItem) -> Result<(), RepositoryError> {
        let action_data = serde_json::to_string(&item.action)
            .map_err(|e| RepositoryError::Decode(format!("encode action payload: {e}")))?;

        sqlx::query(
            "INSERT INTO approval_queue (id, kind, action_type, action_data, conversation_id,
                                         guest_id, status, decided_at, decided_by,
                                         rejection_reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(item.kind.as_str())
        .bind(item.action_type.as_str())
        .bind(&action_data)
        .bind(item.conversation_id.as_ref().map(|id| id.0.clone()))
        .bind(item.guest_id.as_ref().map(|id| id.0.clone()))
        .bind(item.status.as_str())
        .bind(item.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(&item.decided_by)
        .bind(&item.rejection_reason)
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &ApprovalItemId,
    ) -> Result<Option<ApprovalQueueItem>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_queue WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_item(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<ApprovalQueueItem>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM approval_queue
             WHERE status = 'pending'
             ORDER BY created_at ASC
             LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()
    }

    async fn decide(
        &self,
        id: &ApprovalItemId,
        outcome: ApprovalOutcome,
        decided_by: &str,
        reason: Option<String>,
    ) -> Result<ApprovalQueueItem, RepositoryError> {
        let mut item = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.0.clone()))?;

        // Pure state-machine validation first: non-pending items and blank
        // rejection reasons fail before any write.
        item.decide(outcome, decided_by, reason)?;

        // The guard on status makes the transition atomic under concurrent
        // decisions: the loser of the race updates zero rows.
        let updated = sqlx::query(
            "UPDATE approval_queue
             SET status = ?, decided_at = ?, decided_by = ?, rejection_reason = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(item.status.as_str())
        .bind(item.decided_at.map(|dt| dt.to_rfc3339()))
        .bind(&item.decided_by)
        .bind(&item.rejection_reason)
        .bind(&id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let current = self
                .find_by_id(id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(id.0.clone()))?;
            return Err(RepositoryError::Domain(
                maitred_core::errors::DomainError::InvalidApprovalTransition {
                    from: current.status,
                    to: item.status,
                },
            ));
        }

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use maitred_core::autonomy::ActionType;
    use maitred_core::domain::approval::{
        ApprovalItemId, ApprovalOutcome, ApprovalQueueItem, ApprovalStatus, ProposedAction,
    };
    use maitred_core::domain::classification::Department;
    use maitred_core::domain::message::ConversationId;
    use maitred_core::domain::task::{NewServiceTask, TaskPriority, TaskType};
    use maitred_core::errors::DomainError;

    use super::SqlApprovalQueueRepository;
    use crate::repositories::{ApprovalQueueRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlApprovalQueueRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlApprovalQueueRepository::new(pool)
    }

    fn task_item() -> ApprovalQueueItem {
        let conversation_id = ConversationId("C-1".to_string());
        ApprovalQueueItem::new(
            ActionType::CreateHousekeepingTask,
            ProposedAction::Task {
                task: NewServiceTask {
                    department: Department::Housekeeping,
                    task_type: TaskType::Housekeeping,
                    priority: TaskPriority::Standard,
                    description: "Guest request classified as `request.housekeeping.towels`"
                        .to_string(),
                    guest_id: None,
                    conversation_id: Some(conversation_id.clone()),
                },
            },
            Some(conversation_id),
            None,
        )
    }

    #[tokio::test]
    async fn enqueue_and_find_round_trips_the_typed_payload() {
        let repo = setup().await;
        let item = task_item();
        repo.enqueue(item.clone()).await.expect("enqueue");

        let found = repo.find_by_id(&item.id).await.expect("find").expect("exists");
        assert_eq!(found, item);
        assert_eq!(found.status, ApprovalStatus::Pending);
    }

    #[tokio::test]
    async fn list_pending_is_oldest_first_and_excludes_decided() {
        let repo = setup().await;

        let first = task_item();
        repo.enqueue(first.clone()).await.expect("enqueue first");
        let second = task_item();
        repo.enqueue(second.clone()).await.expect("enqueue second");
        let decided = task_item();
        repo.enqueue(decided.clone()).await.expect("enqueue decided");
        repo.decide(&decided.id, ApprovalOutcome::Approve, "staff:ana", None)
            .await
            .expect("decide");

        let pending = repo.list_pending(10).await.expect("list");
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|item| item.status == ApprovalStatus::Pending));
    }

    #[tokio::test]
    async fn approve_then_reject_fails_and_keeps_approved() {
        let repo = setup().await;
        let item = task_item();
        repo.enqueue(item.clone()).await.expect("enqueue");

        let approved = repo
            .decide(&item.id, ApprovalOutcome::Approve, "staff:ana", None)
            .await
            .expect("first decision");
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.decided_by.as_deref(), Some("staff:ana"));

        let error = repo
            .decide(&item.id, ApprovalOutcome::Reject, "staff:ben", Some("duplicate".to_string()))
            .await
            .expect_err("second decision must fail");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::InvalidApprovalTransition {
                from: ApprovalStatus::Approved,
                ..
            })
        ));

        let found = repo.find_by_id(&item.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ApprovalStatus::Approved);
        assert_eq!(found.decided_by.as_deref(), Some("staff:ana"));
    }

    #[tokio::test]
    async fn concurrent_approve_and_reject_admit_exactly_one_winner() {
        let repo = setup().await;
        let item = task_item();
        repo.enqueue(item.clone()).await.expect("enqueue");

        let approve = repo.decide(&item.id, ApprovalOutcome::Approve, "staff:ana", None);
        let reject = repo.decide(
            &item.id,
            ApprovalOutcome::Reject,
            "staff:ben",
            Some("duplicate request".to_string()),
        );
        let (approve_result, reject_result) = tokio::join!(approve, reject);

        assert!(
            approve_result.is_ok() ^ reject_result.is_ok(),
            "exactly one decision must win: approve={approve_result:?} reject={reject_result:?}"
        );

        let stored = repo.find_by_id(&item.id).await.expect("find").expect("exists");
        if approve_result.is_ok() {
            assert_eq!(stored.status, ApprovalStatus::Approved);
            assert_eq!(stored.decided_by.as_deref(), Some("staff:ana"));
        } else {
            assert_eq!(stored.status, ApprovalStatus::Rejected);
            assert_eq!(stored.decided_by.as_deref(), Some("staff:ben"));
        }
    }

    #[tokio::test]
    async fn reject_requires_reason_and_records_it() {
        let repo = setup().await;
        let item = task_item();
        repo.enqueue(item.clone()).await.expect("enqueue");

        let error = repo
            .decide(&item.id, ApprovalOutcome::Reject, "staff:ana", None)
            .await
            .expect_err("missing reason");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::MissingRejectionReason)
        ));

        let rejected = repo
            .decide(
                &item.id,
                ApprovalOutcome::Reject,
                "staff:ana",
                Some("guest already served".to_string()),
            )
            .await
            .expect("reject");
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("guest already served"));
    }

    #[tokio::test]
    async fn deciding_a_missing_item_is_not_found() {
        let repo = setup().await;
        let error = repo
            .decide(
                &ApprovalItemId("missing".to_string()),
                ApprovalOutcome::Approve,
                "staff:ana",
                None,
            )
            .await
            .expect_err("missing item");
        assert!(matches!(error, RepositoryError::NotFound(id) if id == "missing"));
    }
}
