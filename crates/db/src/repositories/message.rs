use chrono::{DateTime, Utc};
use sqlx::Row;

use maitred_core::domain::message::{ConversationId, Message, MessageDirection, MessageId};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let direction_raw: String =
        row.try_get("direction").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let direction = MessageDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown message direction `{direction_raw}`"))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{created_at_raw}`: {e}")))?;

    Ok(Message {
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        direction,
        content,
        created_at,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation_message (id, conversation_id, direction, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id.0)
        .bind(&message.conversation_id.0)
        .bind(message.direction.as_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_history(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        // Newest N selected first, then flipped back to chronological order.
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, conversation_id, direction, content, created_at
             FROM conversation_message
             WHERE conversation_id = ?
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(&conversation_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages =
            rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}
