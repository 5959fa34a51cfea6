//! The decision pipeline behind every inbound guest message: generate a
//! response, apply autonomy policy to it, route any service task, and defer
//! whatever policy refuses into the approval queue.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use maitred_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use maitred_core::autonomy::{ActionType, AutonomySettings, ConfidenceDecision};
use maitred_core::domain::approval::{
    ApprovalItemId, ApprovalOutcome, ApprovalQueueItem, ProposedAction,
};
use maitred_core::domain::classification::Department;
use maitred_core::domain::guest::{GuestContext, GuestId};
use maitred_core::domain::message::ConversationId;
use maitred_core::domain::response::GeneratedResponse;
use maitred_core::domain::task::TaskPriority;
use maitred_core::errors::DomainError;
use maitred_core::routing::TaskRouter;
use maitred_db::repositories::{ApprovalQueueRepository, RepositoryError, SettingsRepository};

use crate::generator::{GenerationError, ResponseGenerator};
use crate::providers::TaskSink;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("task creation failed: {0}")]
    TaskCreation(anyhow::Error),
}

/// What happened to the generated reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyDisposition {
    /// Policy cleared the reply for delivery without staff review.
    AutoSend,
    /// The reply sits in the approval queue until staff decide.
    PendingApproval { item_id: ApprovalItemId },
}

/// What happened on the service-task side of the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskDisposition {
    /// The message did not call for a task, or routing declined.
    NotNeeded,
    AutoCreated { department: Department, priority: TaskPriority },
    PendingApproval { item_id: ApprovalItemId },
}

#[derive(Clone, Debug)]
pub struct InboundOutcome {
    pub response: GeneratedResponse,
    pub reply: ReplyDisposition,
    pub task: TaskDisposition,
    pub correlation_id: String,
}

pub struct ButlerPipeline {
    generator: ResponseGenerator,
    settings: RwLock<AutonomySettings>,
    settings_repo: Arc<dyn SettingsRepository>,
    router: TaskRouter,
    queue: Arc<dyn ApprovalQueueRepository>,
    tasks: Arc<dyn TaskSink>,
    audit: Arc<dyn AuditSink>,
}

impl ButlerPipeline {
    /// Builds the pipeline, loading persisted autonomy settings. A missing
    /// settings document falls back to the conservative defaults.
    pub async fn new(
        generator: ResponseGenerator,
        settings_repo: Arc<dyn SettingsRepository>,
        queue: Arc<dyn ApprovalQueueRepository>,
        tasks: Arc<dyn TaskSink>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, RepositoryError> {
        let settings = settings_repo.load().await?.unwrap_or_default();
        Ok(Self {
            generator,
            settings: RwLock::new(settings),
            settings_repo,
            router: TaskRouter::new(),
            queue,
            tasks,
            audit,
        })
    }

    /// Full treatment of one inbound guest message.
    pub async fn handle_inbound(
        &self,
        conversation_id: &ConversationId,
        inbound_message: &str,
        guest: Option<&GuestContext>,
    ) -> Result<InboundOutcome, PipelineError> {
        let correlation_id = Uuid::new_v4().to_string();

        let response =
            self.generator.generate(conversation_id, inbound_message, guest).await?;

        let settings = self.settings.read().await.clone();
        let guest_id = guest.and_then(GuestContext::guest_id).cloned();

        let reply = self
            .dispose_reply(&settings, conversation_id, guest, &guest_id, &response, &correlation_id)
            .await?;

        let task = self
            .dispose_task(&settings, conversation_id, guest, &guest_id, &response, &correlation_id)
            .await?;

        info!(
            event_name = "pipeline.inbound_handled",
            conversation_id = %conversation_id.0,
            correlation_id = %correlation_id,
            cached = response.metadata.cached,
            reply_auto = matches!(reply, ReplyDisposition::AutoSend),
        );

        Ok(InboundOutcome { response, reply, task, correlation_id })
    }

    async fn dispose_reply(
        &self,
        settings: &AutonomySettings,
        conversation_id: &ConversationId,
        guest: Option<&GuestContext>,
        guest_id: &Option<GuestId>,
        response: &GeneratedResponse,
        correlation_id: &str,
    ) -> Result<ReplyDisposition, PipelineError> {
        let level_ok = settings.can_auto_execute(ActionType::SendResponse, guest);
        let confidence_ok =
            settings.decide_by_confidence(response.confidence) == ConfidenceDecision::Auto;

        if level_ok && confidence_ok {
            self.audit.emit(
                AuditEvent::new(
                    Some(conversation_id.clone()),
                    correlation_id,
                    "response.auto_sent",
                    AuditCategory::Pipeline,
                    "pipeline",
                    AuditOutcome::Success,
                )
                .with_metadata("confidence", format!("{:.2}", response.confidence)),
            );
            return Ok(ReplyDisposition::AutoSend);
        }

        let item = ApprovalQueueItem::new(
            ActionType::SendResponse,
            ProposedAction::Response {
                conversation_id: conversation_id.clone(),
                content: response.content.clone(),
            },
            Some(conversation_id.clone()),
            guest_id.clone(),
        );
        let item_id = item.id.clone();
        self.queue.enqueue(item).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(conversation_id.clone()),
                correlation_id,
                "response.deferred",
                AuditCategory::Policy,
                "pipeline",
                AuditOutcome::Deferred,
            )
            .with_metadata("item_id", item_id.0.clone())
            .with_metadata(
                "reason",
                if level_ok { "confidence_below_threshold" } else { "level_requires_approval" },
            ),
        );
        Ok(ReplyDisposition::PendingApproval { item_id })
    }

    async fn dispose_task(
        &self,
        settings: &AutonomySettings,
        conversation_id: &ConversationId,
        guest: Option<&GuestContext>,
        guest_id: &Option<GuestId>,
        response: &GeneratedResponse,
        correlation_id: &str,
    ) -> Result<TaskDisposition, PipelineError> {
        let Some(classification) = response.metadata.classification.as_ref() else {
            return Ok(TaskDisposition::NotNeeded);
        };

        let owned_context;
        let context = match guest {
            Some(context) => context,
            None => {
                owned_context = GuestContext::default();
                &owned_context
            }
        };

        let decision = self.router.process(classification, context);
        let Some(task) = decision.into_task(context) else {
            return Ok(TaskDisposition::NotNeeded);
        };

        let action = ActionType::for_task_type(task.task_type);
        // Urgent tasks get an extra confidence bar before running unattended.
        let urgency_ok = task.priority != TaskPriority::Urgent
            || settings.is_urgent_confidence(classification.confidence);

        if settings.can_auto_execute(action, guest) && urgency_ok {
            let department = task.department;
            let priority = task.priority;
            self.tasks.create_task(task).await.map_err(PipelineError::TaskCreation)?;
            self.audit.emit(
                AuditEvent::new(
                    Some(conversation_id.clone()),
                    correlation_id,
                    "task.auto_created",
                    AuditCategory::Pipeline,
                    "pipeline",
                    AuditOutcome::Success,
                )
                .with_metadata("department", department.as_str())
                .with_metadata("priority", priority.as_str()),
            );
            return Ok(TaskDisposition::AutoCreated { department, priority });
        }

        let item = ApprovalQueueItem::new(
            action,
            ProposedAction::Task { task },
            Some(conversation_id.clone()),
            guest_id.clone(),
        );
        let item_id = item.id.clone();
        self.queue.enqueue(item).await?;
        self.audit.emit(
            AuditEvent::new(
                Some(conversation_id.clone()),
                correlation_id,
                "task.deferred",
                AuditCategory::Policy,
                "pipeline",
                AuditOutcome::Deferred,
            )
            .with_metadata("item_id", item_id.0.clone()),
        );
        Ok(TaskDisposition::PendingApproval { item_id })
    }

    /// Applies a staff decision to a queued item. Approving a deferred task
    /// also executes it; approved responses and offers are returned to the
    /// caller, whose delivery surface owns their execution.
    pub async fn decide(
        &self,
        id: &ApprovalItemId,
        outcome: ApprovalOutcome,
        decided_by: &str,
        reason: Option<String>,
    ) -> Result<ApprovalQueueItem, PipelineError> {
        let item = self.queue.decide(id, outcome, decided_by, reason).await?;

        let audit_outcome = match outcome {
            ApprovalOutcome::Approve => AuditOutcome::Success,
            ApprovalOutcome::Reject => AuditOutcome::Rejected,
        };
        self.audit.emit(
            AuditEvent::new(
                item.conversation_id.clone(),
                Uuid::new_v4().to_string(),
                "approval.decided",
                AuditCategory::Approval,
                decided_by,
                audit_outcome,
            )
            .with_metadata("item_id", item.id.0.clone())
            .with_metadata("kind", item.kind.as_str()),
        );

        if outcome == ApprovalOutcome::Approve {
            if let ProposedAction::Task { task } = &item.action {
                self.tasks
                    .create_task(task.clone())
                    .await
                    .map_err(PipelineError::TaskCreation)?;
                info!(
                    event_name = "pipeline.approved_task_created",
                    item_id = %item.id.0,
                    department = task.department.as_str(),
                );
            }
        }

        Ok(item)
    }

    pub async fn pending_approvals(
        &self,
        limit: u32,
    ) -> Result<Vec<ApprovalQueueItem>, PipelineError> {
        Ok(self.queue.list_pending(limit).await?)
    }

    /// Validates, persists, and applies a full replacement settings document.
    /// The in-memory copy only changes once the save has succeeded.
    pub async fn save_settings(&self, settings: AutonomySettings) -> Result<(), PipelineError> {
        settings.validate()?;
        if let Err(error) = self.settings_repo.save(&settings).await {
            warn!(event_name = "pipeline.settings_save_failed", %error);
            return Err(error.into());
        }
        *self.settings.write().await = settings;
        Ok(())
    }

    pub async fn settings(&self) -> AutonomySettings {
        self.settings.read().await.clone()
    }
}
