pub mod audit;
pub mod autonomy;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod routing;

pub use autonomy::{
    ActionConfig, ActionType, AutomationLevel, AutonomySettings, ConfidenceDecision,
    ConfidenceThresholds,
};
pub use domain::approval::{
    ApprovalItemId, ApprovalItemKind, ApprovalOutcome, ApprovalQueueItem, ApprovalStatus,
    ProposedAction,
};
pub use domain::classification::{ClassificationResult, Department};
pub use domain::guest::{GuestContext, GuestId, GuestProfile, ReservationSummary, StayPhase};
pub use domain::knowledge::KnowledgeMatch;
pub use domain::message::{ConversationId, Message, MessageDirection, MessageId};
pub use domain::response::{GeneratedResponse, KnowledgeRef, ProviderUsage, ResponseMetadata};
pub use domain::task::{NewServiceTask, TaskPriority, TaskType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use routing::{RoutingDecision, TaskRouter, ACTIONABILITY_FLOOR};
