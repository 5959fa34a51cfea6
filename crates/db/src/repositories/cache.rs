use chrono::{DateTime, Utc};
use sqlx::Row;

use maitred_core::domain::cache::CacheEntry;

use super::{RepositoryError, ResponseCacheRepository};
use crate::DbPool;

pub struct SqlResponseCacheRepository {
    pool: DbPool,
}

impl SqlResponseCacheRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<CacheEntry, RepositoryError> {
    let query_fingerprint: String =
        row.try_get("query_fingerprint").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let query_text: String =
        row.try_get("query_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let response: String =
        row.try_get("response").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let intent: Option<String> =
        row.try_get("intent").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let hit_count: i64 =
        row.try_get("hit_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_hit_at_raw: Option<String> =
        row.try_get("last_hit_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expires_at_raw: String =
        row.try_get("expires_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let last_hit_at = last_hit_at_raw.as_deref().map(parse_timestamp).transpose()?;

    Ok(CacheEntry {
        query_fingerprint,
        query_text,
        response,
        intent,
        hit_count: hit_count.max(0) as u32,
        last_hit_at,
        expires_at: parse_timestamp(&expires_at_raw)?,
        created_at: parse_timestamp(&created_at_raw)?,
    })
}

#[async_trait::async_trait]
impl ResponseCacheRepository for SqlResponseCacheRepository {
    async fn find_live(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, RepositoryError> {
        let row = sqlx::query(
            "SELECT query_fingerprint, query_text, response, intent, hit_count,
                    last_hit_at, expires_at, created_at
             FROM response_cache
             WHERE query_fingerprint = ? AND expires_at > ?",
        )
        .bind(fingerprint)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn record_hit(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE response_cache
             SET hit_count = hit_count + 1, last_hit_at = ?
             WHERE query_fingerprint = ?",
        )
        .bind(now.to_rfc3339())
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO response_cache (query_fingerprint, query_text, response, intent,
                                         hit_count, last_hit_at, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(query_fingerprint) DO UPDATE SET
                 query_text = excluded.query_text,
                 response = excluded.response,
                 intent = excluded.intent,
                 expires_at = excluded.expires_at",
        )
        .bind(&entry.query_fingerprint)
        .bind(&entry.query_text)
        .bind(&entry.response)
        .bind(&entry.intent)
        .bind(i64::from(entry.hit_count))
        .bind(entry.last_hit_at.map(|dt| dt.to_rfc3339()))
        .bind(entry.expires_at.to_rfc3339())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune(&self, now: DateTime<Utc>, max_entries: u32) -> Result<u64, RepositoryError> {
        let expired = sqlx::query("DELETE FROM response_cache WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?
            .rows_affected();

        let remaining = self.count().await?;
        let overflow = remaining.saturating_sub(u64::from(max_entries));
        if overflow == 0 {
            return Ok(expired);
        }

        let evicted = sqlx::query(
            "DELETE FROM response_cache WHERE query_fingerprint IN (
                 SELECT query_fingerprint FROM response_cache
                 ORDER BY COALESCE(last_hit_at, created_at) ASC
                 LIMIT ?
             )",
        )
        .bind(overflow as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(expired + evicted)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM response_cache")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(n.max(0) as u64)
    }
}
