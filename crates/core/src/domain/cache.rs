use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable answer keyed by query fingerprint. `query_text` is a truncated
/// diagnostic copy of the original query; matching only ever uses the
/// fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query_fingerprint: String,
    pub query_text: String,
    pub response: String,
    pub intent: Option<String>,
    pub hit_count: u32,
    pub last_hit_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entries past expiry are invisible to lookups even before a prune pass
    /// physically removes them.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Eviction recency key: oldest by last hit, falling back to creation.
    pub fn recency(&self) -> DateTime<Utc> {
        self.last_hit_at.unwrap_or(self.created_at)
    }
}
