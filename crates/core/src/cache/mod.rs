//! Cacheability gate, query normalization, and fingerprinting for the shared
//! response cache.
//!
//! The cache is keyed by content fingerprint, not by conversation, so the
//! gate has to keep guest- and time-specific queries out: such answers must
//! never be replayed to another guest or a later day.

/// Words that mark a query as personal to one guest.
const PERSONAL_WORDS: &[&str] = &["my", "me", "mine", "our", "us"];

/// Words that make an answer time-sensitive.
const TIME_SENSITIVE_WORDS: &[&str] =
    &["today", "tonight", "tomorrow", "now", "currently", "yesterday"];

/// Phrases that ask for a human contact instead of information.
const CONTACT_PHRASES: &[&str] =
    &["call me", "phone me", "contact me", "speak to", "talk to someone", "front desk call"];

/// Hex length of the truncated fingerprint.
const FINGERPRINT_LEN: usize = 16;

/// Diagnostic copy of the query stored alongside an entry, never matched on.
pub const QUERY_TEXT_MAX_LEN: usize = 120;

/// Lower-cases, strips punctuation, and collapses whitespace so trivially
/// reworded queries share a fingerprint.
pub fn normalize_query(query: &str) -> String {
    let mut sanitized = String::with_capacity(query.len());
    for character in query.chars() {
        if character.is_alphanumeric() {
            sanitized.extend(character.to_lowercase());
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable truncated hash of the normalized query.
pub fn fingerprint(query: &str) -> String {
    let normalized = normalize_query(query);
    let digest = blake3::hash(normalized.as_bytes());
    digest.to_hex()[..FINGERPRINT_LEN].to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheRefusal {
    TooShort,
    PersonalReference,
    TimeSensitive,
    ContactRequest,
}

/// Why a query may not be cached, or `None` when it is cacheable. Applied
/// identically on lookup and store.
pub fn cache_refusal(query: &str, min_query_len: usize) -> Option<CacheRefusal> {
    let normalized = normalize_query(query);
    if normalized.chars().count() < min_query_len {
        return Some(CacheRefusal::TooShort);
    }

    let words: Vec<&str> = normalized.split(' ').collect();
    if words.iter().any(|word| PERSONAL_WORDS.contains(word)) {
        return Some(CacheRefusal::PersonalReference);
    }
    if words.iter().any(|word| TIME_SENSITIVE_WORDS.contains(word)) {
        return Some(CacheRefusal::TimeSensitive);
    }
    if CONTACT_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
        return Some(CacheRefusal::ContactRequest);
    }

    None
}

pub fn is_cacheable(query: &str, min_query_len: usize) -> bool {
    cache_refusal(query, min_query_len).is_none()
}

/// Char-boundary-safe truncation for the stored diagnostic text.
pub fn truncate_query_text(query: &str) -> String {
    if query.chars().count() <= QUERY_TEXT_MAX_LEN {
        return query.to_string();
    }
    query.chars().take(QUERY_TEXT_MAX_LEN).collect()
}
