//! Response cache service: cacheability gate plus storage, with
//! degraded-but-safe failure semantics. A broken cache backend must read as
//! a miss and write as a no-op; it never fails the pipeline.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use maitred_core::cache::{cache_refusal, fingerprint, truncate_query_text};
use maitred_core::config::CacheConfig;
use maitred_core::domain::cache::CacheEntry;
use maitred_db::repositories::ResponseCacheRepository;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: String,
    pub intent: Option<String>,
}

/// Upper bound on an entry's lifetime. Configured TTLs beyond a century are
/// clamped instead of overflowing the expiry arithmetic.
const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

pub struct ResponseCache {
    repo: Arc<dyn ResponseCacheRepository>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(repo: Arc<dyn ResponseCacheRepository>, config: CacheConfig) -> Self {
        Self { repo, config }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn lookup(&self, query_text: &str) -> Option<CachedResponse> {
        if !self.config.enabled {
            return None;
        }
        if let Some(refusal) = cache_refusal(query_text, self.config.min_query_len) {
            tracing::debug!(event_name = "cache.lookup_skipped", reason = ?refusal);
            return None;
        }

        let fingerprint = fingerprint(query_text);
        let now = Utc::now();
        match self.repo.find_live(&fingerprint, now).await {
            Ok(Some(entry)) => {
                if let Err(error) = self.repo.record_hit(&fingerprint, now).await {
                    warn!(event_name = "cache.hit_stat_failed", %fingerprint, %error);
                }
                Some(CachedResponse { response: entry.response, intent: entry.intent })
            }
            Ok(None) => None,
            Err(error) => {
                warn!(event_name = "cache.lookup_failed", %fingerprint, %error);
                None
            }
        }
    }

    /// Stores a reusable answer, then runs the prune pass (expiry sweep plus
    /// capacity eviction). Uncacheable queries and storage failures are
    /// no-ops.
    pub async fn store(&self, query_text: &str, response: &str, intent: Option<&str>) {
        if !self.config.enabled || cache_refusal(query_text, self.config.min_query_len).is_some() {
            return;
        }

        let now = Utc::now();
        let ttl = i64::try_from(self.config.ttl_secs).unwrap_or(MAX_TTL_SECS).min(MAX_TTL_SECS);
        let entry = CacheEntry {
            query_fingerprint: fingerprint(query_text),
            query_text: truncate_query_text(query_text),
            response: response.to_string(),
            intent: intent.map(str::to_string),
            hit_count: 0,
            last_hit_at: None,
            expires_at: now + Duration::seconds(ttl),
            created_at: now,
        };

        if let Err(error) = self.repo.upsert(entry).await {
            warn!(event_name = "cache.store_failed", %error);
            return;
        }
        if let Err(error) = self.repo.prune(now, self.config.max_entries).await {
            warn!(event_name = "cache.prune_failed", %error);
        }
    }
}
