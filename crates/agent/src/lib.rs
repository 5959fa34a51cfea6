//! Butler Runtime - response generation and decision orchestration
//!
//! This crate is the "brain" of the maitred system - the pipeline that sits
//! behind every inbound guest message:
//! - Serves repeated questions from the shared response cache (`cache`)
//! - Generates grounded replies via pluggable providers (`generator`)
//! - Applies autonomy policy and routes service tasks (`pipeline`)
//! - Defers anything policy refuses into the approval queue
//!
//! # Architecture
//!
//! The pipeline follows a constrained loop:
//! 1. **Cache lookup** (`cache`) - fingerprint match, no providers on a hit
//! 2. **Classification + retrieval** (`generator`) - intent and knowledge
//! 3. **Policy gating** (`pipeline`) - L1/L2 levels and confidence thresholds
//! 4. **Deferral** - pending approval items for staff review
//!
//! # Safety Principle
//!
//! The LLM is strictly a writer. It NEVER decides whether a reply is sent or
//! a task is created. Those are deterministic decisions made by the autonomy
//! policy engine against operator-configured settings.

pub mod cache;
pub mod generator;
pub mod pipeline;
pub mod prompt;
pub mod providers;

pub use cache::{CachedResponse, ResponseCache};
pub use generator::{GenerationError, ResponseGenerator};
pub use pipeline::{
    ButlerPipeline, InboundOutcome, PipelineError, ReplyDisposition, TaskDisposition,
};
pub use providers::{
    ChatMessage, Completion, CompletionProvider, IntentClassifier, KnowledgeProvider, Role,
    SearchOptions, TaskSink,
};
