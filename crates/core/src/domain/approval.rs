use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::autonomy::ActionType;
use crate::domain::guest::GuestId;
use crate::domain::message::ConversationId;
use crate::domain::task::NewServiceTask;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalItemId(pub String);

impl ApprovalItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalItemKind {
    Response,
    Task,
    Offer,
}

impl ApprovalItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Task => "task",
            Self::Offer => "offer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "response" => Some(Self::Response),
            "task" => Some(Self::Task),
            "offer" => Some(Self::Offer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The deferred action held behind a pending approval. Typed rather than
/// free-form JSON so the payload is validated at the decode boundary and an
/// approved item can actually be executed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    Response { conversation_id: ConversationId, content: String },
    Task { task: NewServiceTask },
    Offer { description: String, amount: Option<Decimal>, percent: Option<Decimal> },
}

impl ProposedAction {
    pub fn kind(&self) -> ApprovalItemKind {
        match self {
            Self::Response { .. } => ApprovalItemKind::Response,
            Self::Task { .. } => ApprovalItemKind::Task,
            Self::Offer { .. } => ApprovalItemKind::Offer,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approve,
    Reject,
}

/// One entry in the approval queue. Created when the policy engine refuses
/// auto-execution; retained after decision for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalQueueItem {
    pub id: ApprovalItemId,
    pub kind: ApprovalItemKind,
    pub action_type: ActionType,
    pub action: ProposedAction,
    pub conversation_id: Option<ConversationId>,
    pub guest_id: Option<GuestId>,
    pub status: ApprovalStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalQueueItem {
    pub fn new(
        action_type: ActionType,
        action: ProposedAction,
        conversation_id: Option<ConversationId>,
        guest_id: Option<GuestId>,
    ) -> Self {
        Self {
            id: ApprovalItemId::generate(),
            kind: action.kind(),
            action_type,
            action,
            conversation_id,
            guest_id,
            status: ApprovalStatus::Pending,
            decided_at: None,
            decided_by: None,
            rejection_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Applies a staff decision. Only `pending -> approved` and
    /// `pending -> rejected` are legal, exactly once; rejection requires a
    /// non-empty reason.
    pub fn decide(
        &mut self,
        outcome: ApprovalOutcome,
        decided_by: impl Into<String>,
        reason: Option<String>,
    ) -> Result<(), DomainError> {
        if self.status != ApprovalStatus::Pending {
            return Err(DomainError::InvalidApprovalTransition {
                from: self.status,
                to: match outcome {
                    ApprovalOutcome::Approve => ApprovalStatus::Approved,
                    ApprovalOutcome::Reject => ApprovalStatus::Rejected,
                },
            });
        }

        match outcome {
            ApprovalOutcome::Approve => {
                self.status = ApprovalStatus::Approved;
            }
            ApprovalOutcome::Reject => {
                let reason = reason.as_deref().map(str::trim).unwrap_or_default();
                if reason.is_empty() {
                    return Err(DomainError::MissingRejectionReason);
                }
                self.status = ApprovalStatus::Rejected;
                self.rejection_reason = Some(reason.to_string());
            }
        }

        self.decided_at = Some(Utc::now());
        self.decided_by = Some(decided_by.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::autonomy::ActionType;
    use crate::domain::message::ConversationId;
    use crate::errors::DomainError;

    use super::{
        ApprovalItemKind, ApprovalOutcome, ApprovalQueueItem, ApprovalStatus, ProposedAction,
    };

    fn pending_response_item() -> ApprovalQueueItem {
        let conversation_id = ConversationId("C-1".to_string());
        ApprovalQueueItem::new(
            ActionType::SendResponse,
            ProposedAction::Response {
                conversation_id: conversation_id.clone(),
                content: "Your late checkout is confirmed.".to_string(),
            },
            Some(conversation_id),
            None,
        )
    }

    #[test]
    fn kind_is_derived_from_the_action_payload() {
        let item = pending_response_item();
        assert_eq!(item.kind, ApprovalItemKind::Response);
        assert_eq!(item.status, ApprovalStatus::Pending);
    }

    #[test]
    fn approve_transitions_once_and_records_decider() {
        let mut item = pending_response_item();
        item.decide(ApprovalOutcome::Approve, "staff:ana", None).expect("first decision");

        assert_eq!(item.status, ApprovalStatus::Approved);
        assert_eq!(item.decided_by.as_deref(), Some("staff:ana"));
        assert!(item.decided_at.is_some());
    }

    #[test]
    fn second_decision_fails_and_keeps_terminal_state() {
        let mut item = pending_response_item();
        item.decide(ApprovalOutcome::Approve, "staff:ana", None).expect("approve");

        let error = item
            .decide(ApprovalOutcome::Reject, "staff:ben", Some("duplicate".to_string()))
            .expect_err("already decided");
        assert!(matches!(
            error,
            DomainError::InvalidApprovalTransition { from: ApprovalStatus::Approved, .. }
        ));
        assert_eq!(item.status, ApprovalStatus::Approved);
        assert_eq!(item.decided_by.as_deref(), Some("staff:ana"));
    }

    #[test]
    fn reject_requires_a_non_empty_reason() {
        let mut item = pending_response_item();
        let error = item
            .decide(ApprovalOutcome::Reject, "staff:ana", Some("   ".to_string()))
            .expect_err("blank reason");
        assert!(matches!(error, DomainError::MissingRejectionReason));
        assert_eq!(item.status, ApprovalStatus::Pending);

        item.decide(ApprovalOutcome::Reject, "staff:ana", Some("tone is off".to_string()))
            .expect("reject with reason");
        assert_eq!(item.status, ApprovalStatus::Rejected);
        assert_eq!(item.rejection_reason.as_deref(), Some("tone is off"));
    }
}
