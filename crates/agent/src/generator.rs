//! Response generation: cache-first, then classify, retrieve, and complete.
//! The completion provider is called at most once per inbound message and
//! never on a cache hit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use maitred_core::config::GeneratorConfig;
use maitred_core::domain::guest::{GuestContext, StayPhase};
use maitred_core::domain::message::ConversationId;
use maitred_core::domain::response::{GeneratedResponse, KnowledgeRef, ResponseMetadata};
use maitred_db::repositories::{MessageRepository, RepositoryError};

use crate::cache::ResponseCache;
use crate::prompt::assemble_messages;
use crate::providers::{CompletionProvider, IntentClassifier, KnowledgeProvider, SearchOptions};

/// Generation failures are typed by the collaborator that failed. Cache
/// failures never surface here; the cache degrades to a miss on its own.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("intent classification failed: {0}")]
    Classification(anyhow::Error),
    #[error("knowledge retrieval failed: {0}")]
    Knowledge(anyhow::Error),
    #[error("completion provider failed: {0}")]
    Completion(anyhow::Error),
    #[error("conversation history unavailable")]
    History(#[from] RepositoryError),
}

pub struct ResponseGenerator {
    completion: Arc<dyn CompletionProvider>,
    knowledge: Arc<dyn KnowledgeProvider>,
    classifier: Arc<dyn IntentClassifier>,
    messages: Arc<dyn MessageRepository>,
    cache: Arc<ResponseCache>,
    config: GeneratorConfig,
}

impl ResponseGenerator {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        knowledge: Arc<dyn KnowledgeProvider>,
        classifier: Arc<dyn IntentClassifier>,
        messages: Arc<dyn MessageRepository>,
        cache: Arc<ResponseCache>,
        config: GeneratorConfig,
    ) -> Self {
        Self { completion, knowledge, classifier, messages, cache, config }
    }

    pub async fn generate(
        &self,
        conversation_id: &ConversationId,
        inbound_message: &str,
        guest: Option<&GuestContext>,
    ) -> Result<GeneratedResponse, GenerationError> {
        // Guest-specific conversations bypass the shared cache entirely,
        // for lookup and for the later write-back.
        let cache_eligible =
            self.cache.enabled() && !guest.map(GuestContext::has_profile).unwrap_or(false);

        if cache_eligible {
            if let Some(hit) = self.cache.lookup(inbound_message).await {
                info!(
                    event_name = "generator.cache_hit",
                    conversation_id = %conversation_id.0,
                );
                return Ok(GeneratedResponse::from_cache(hit.response, hit.intent));
            }
        }

        let classification = self
            .classifier
            .classify(inbound_message)
            .await
            .map_err(GenerationError::Classification)?;

        let mut matches = self
            .knowledge
            .search(
                inbound_message,
                SearchOptions {
                    limit: self.config.knowledge_limit,
                    min_similarity: self.config.min_similarity,
                },
            )
            .await
            .map_err(GenerationError::Knowledge)?;
        // Providers are not trusted to honor the floor or the limit.
        matches.retain(|item| item.similarity >= self.config.min_similarity);
        matches.truncate(self.config.knowledge_limit as usize);

        let history =
            self.messages.recent_history(conversation_id, self.config.history_limit).await?;

        let prompt = assemble_messages(
            guest,
            &matches,
            Some(&classification),
            &history,
            inbound_message,
            Utc::now(),
        );

        let completion = self
            .completion
            .complete(&prompt, self.config.max_tokens, self.config.temperature)
            .await
            .map_err(GenerationError::Completion)?;

        debug!(
            event_name = "generator.generated",
            conversation_id = %conversation_id.0,
            intent = %classification.intent,
            confidence = classification.confidence,
            knowledge_matches = matches.len(),
        );

        if cache_eligible && classification.confidence >= self.config.cache_write_confidence {
            let cache = Arc::clone(&self.cache);
            let query = inbound_message.to_string();
            let response = completion.content.clone();
            let intent = classification.intent.clone();
            // Write-back happens off the response path; failures are the
            // cache's to log.
            tokio::spawn(async move {
                cache.store(&query, &response, Some(&intent)).await;
            });
        }

        let knowledge_refs: Vec<KnowledgeRef> = matches
            .iter()
            .map(|item| KnowledgeRef {
                id: item.id.clone(),
                title: item.title.clone(),
                similarity: item.similarity,
            })
            .collect();

        Ok(GeneratedResponse {
            content: completion.content,
            confidence: classification.confidence,
            intent: Some(classification.intent.clone()),
            metadata: ResponseMetadata {
                cached: false,
                classification: Some(classification),
                knowledge: knowledge_refs,
                usage: Some(completion.usage),
                guest_summary: guest.and_then(|context| guest_summary(context)),
            },
        })
    }
}

fn guest_summary(context: &GuestContext) -> Option<String> {
    let profile = context.profile.as_ref()?;
    let mut summary = profile.full_name.clone();
    if let Some(reservation) = &context.reservation {
        if let Some(room) = &reservation.room_number {
            summary.push_str(&format!(", room {room}"));
        }
        match reservation.stay_phase(Utc::now()) {
            StayPhase::Arriving { days_until_check_in } => {
                summary.push_str(&format!(", arriving in {days_until_check_in} day(s)"));
            }
            StayPhase::CheckedIn { nights_remaining } => {
                summary.push_str(&format!(", {nights_remaining} night(s) remaining"));
            }
            StayPhase::CheckedOut => summary.push_str(", checked out"),
        }
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;

    use maitred_core::config::{CacheConfig, GeneratorConfig};
    use maitred_core::domain::cache::CacheEntry;
    use maitred_core::domain::classification::{ClassificationResult, Department};
    use maitred_core::domain::guest::{GuestContext, GuestId, GuestProfile};
    use maitred_core::domain::knowledge::KnowledgeMatch;
    use maitred_core::domain::message::ConversationId;
    use maitred_core::domain::response::{GeneratedResponse, ProviderUsage};
    use maitred_db::repositories::{
        InMemoryMessageRepository, InMemoryResponseCacheRepository, ResponseCacheRepository,
    };

    use crate::cache::ResponseCache;
    use crate::providers::{
        ChatMessage, Completion, CompletionProvider, IntentClassifier, KnowledgeProvider,
        SearchOptions,
    };

    use super::ResponseGenerator;

    pub(crate) struct StubCompletion {
        pub calls: AtomicUsize,
        pub reply: String,
    }

    #[async_trait]
    impl CompletionProvider for StubCompletion {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                content: self.reply.clone(),
                usage: ProviderUsage { prompt_tokens: 120, completion_tokens: 40 },
            })
        }
    }

    pub(crate) struct StubKnowledge {
        pub calls: AtomicUsize,
        pub matches: Vec<KnowledgeMatch>,
    }

    #[async_trait]
    impl KnowledgeProvider for StubKnowledge {
        async fn search(
            &self,
            _query: &str,
            _options: SearchOptions,
        ) -> Result<Vec<KnowledgeMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.matches.clone())
        }
    }

    pub(crate) struct StubClassifier {
        pub calls: AtomicUsize,
        pub result: ClassificationResult,
    }

    #[async_trait]
    impl IntentClassifier for StubClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn generator_config() -> GeneratorConfig {
        GeneratorConfig {
            history_limit: 10,
            knowledge_limit: 3,
            min_similarity: 0.7,
            cache_write_confidence: 0.7,
            max_tokens: 500,
            temperature: 0.3,
        }
    }

    fn cache_config() -> CacheConfig {
        CacheConfig { enabled: true, ttl_secs: 3600, max_entries: 100, min_query_len: 12 }
    }

    struct Fixture {
        generator: ResponseGenerator,
        completion: Arc<StubCompletion>,
        knowledge: Arc<StubKnowledge>,
        classifier: Arc<StubClassifier>,
        cache_repo: Arc<InMemoryResponseCacheRepository>,
    }

    fn fixture(classification: ClassificationResult, matches: Vec<KnowledgeMatch>) -> Fixture {
        let completion = Arc::new(StubCompletion {
            calls: AtomicUsize::new(0),
            reply: "The pool is open 6:00-22:00.".to_string(),
        });
        let knowledge = Arc::new(StubKnowledge { calls: AtomicUsize::new(0), matches });
        let classifier =
            Arc::new(StubClassifier { calls: AtomicUsize::new(0), result: classification });
        let cache_repo = Arc::new(InMemoryResponseCacheRepository::default());
        let cache = Arc::new(ResponseCache::new(
            Arc::clone(&cache_repo) as Arc<dyn ResponseCacheRepository>,
            cache_config(),
        ));
        let generator = ResponseGenerator::new(
            Arc::clone(&completion) as Arc<dyn CompletionProvider>,
            Arc::clone(&knowledge) as Arc<dyn KnowledgeProvider>,
            Arc::clone(&classifier) as Arc<dyn IntentClassifier>,
            Arc::new(InMemoryMessageRepository::default()),
            cache,
            generator_config(),
        );
        Fixture { generator, completion, knowledge, classifier, cache_repo }
    }

    fn question_classification() -> ClassificationResult {
        ClassificationResult {
            intent: "question.amenities.pool".to_string(),
            confidence: 0.85,
            department: None,
            requires_action: false,
        }
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_all_providers() {
        let fx = fixture(question_classification(), Vec::new());
        let query = "what are the pool hours";
        let now = Utc::now();
        fx.cache_repo
            .upsert(CacheEntry {
                query_fingerprint: maitred_core::cache::fingerprint(query),
                query_text: query.to_string(),
                response: "The pool is open 6:00-22:00.".to_string(),
                intent: Some("question.amenities.pool".to_string()),
                hit_count: 0,
                last_hit_at: None,
                expires_at: now + chrono::Duration::hours(1),
                created_at: now,
            })
            .await
            .unwrap();

        let response = fx
            .generator
            .generate(&ConversationId("C-1".to_string()), query, None)
            .await
            .unwrap();

        assert!(response.metadata.cached);
        assert_eq!(response.confidence, GeneratedResponse::CACHE_HIT_CONFIDENCE);
        assert_eq!(response.content, "The pool is open 6:00-22:00.");
        assert_eq!(fx.completion.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.knowledge.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_runs_full_pipeline_and_writes_cache_in_background() {
        let fx = fixture(question_classification(), Vec::new());

        let response = fx
            .generator
            .generate(&ConversationId("C-1".to_string()), "what are the pool hours", None)
            .await
            .unwrap();

        assert!(!response.metadata.cached);
        assert_eq!(response.confidence, 0.85);
        assert_eq!(response.intent.as_deref(), Some("question.amenities.pool"));
        assert_eq!(fx.completion.calls.load(Ordering::SeqCst), 1);

        // The write-back is spawned; poll briefly for it to land.
        let mut stored = 0;
        for _ in 0..50 {
            stored = fx.cache_repo.count().await.unwrap();
            if stored > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn second_reworded_query_is_served_from_cache() {
        let fx = fixture(
            ClassificationResult {
                intent: "question.dining.breakfast".to_string(),
                confidence: 0.85,
                department: None,
                requires_action: false,
            },
            Vec::new(),
        );
        let conversation = ConversationId("C-1".to_string());

        let first = fx
            .generator
            .generate(&conversation, "What time is breakfast served?", None)
            .await
            .unwrap();
        assert!(!first.metadata.cached);
        assert_eq!(fx.completion.calls.load(Ordering::SeqCst), 1);

        for _ in 0..50 {
            if fx.cache_repo.count().await.unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let second = fx
            .generator
            .generate(&conversation, "what TIME is breakfast served", None)
            .await
            .unwrap();
        assert!(second.metadata.cached);
        assert_eq!(second.confidence, GeneratedResponse::CACHE_HIT_CONFIDENCE);
        assert_eq!(second.intent.as_deref(), Some("question.dining.breakfast"));
        assert_eq!(second.content, first.content);
        assert_eq!(fx.completion.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.knowledge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn identified_guest_skips_cache_lookup_and_write() {
        let fx = fixture(question_classification(), Vec::new());
        let guest = GuestContext {
            profile: Some(GuestProfile {
                id: GuestId("G-1".to_string()),
                full_name: "Ada Byron".to_string(),
                language: None,
                vip: false,
                notes: None,
            }),
            reservation: None,
        };

        let response = fx
            .generator
            .generate(&ConversationId("C-1".to_string()), "what are the pool hours", Some(&guest))
            .await
            .unwrap();

        assert!(!response.metadata.cached);
        assert_eq!(fx.completion.calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.metadata.guest_summary.as_deref(), Some("Ada Byron"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.cache_repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn low_confidence_generation_is_not_written_back() {
        let mut classification = question_classification();
        classification.confidence = 0.4;
        let fx = fixture(classification, Vec::new());

        fx.generator
            .generate(&ConversationId("C-1".to_string()), "what are the pool hours", None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.cache_repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn knowledge_below_similarity_floor_is_dropped_from_metadata() {
        let matches = vec![
            KnowledgeMatch {
                id: "kb-1".to_string(),
                title: "Pool hours".to_string(),
                content: "6:00-22:00".to_string(),
                similarity: 0.92,
            },
            KnowledgeMatch {
                id: "kb-2".to_string(),
                title: "Spa brochure".to_string(),
                content: "...".to_string(),
                similarity: 0.31,
            },
        ];
        let fx = fixture(question_classification(), matches);

        let response = fx
            .generator
            .generate(&ConversationId("C-1".to_string()), "what are the pool hours", None)
            .await
            .unwrap();

        assert_eq!(response.metadata.knowledge.len(), 1);
        assert_eq!(response.metadata.knowledge[0].id, "kb-1");
        let classification = response.metadata.classification.unwrap();
        assert_eq!(classification.department, None::<Department>);
    }
}
