//! Autonomy policy engine: per-action automation levels, confidence
//! thresholds, and financial auto-approval limits.
//!
//! Settings are a single mutable document, loaded at startup and replaced
//! wholesale on save. All decision operations here are pure functions of the
//! current settings so they can be exercised without I/O.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::guest::GuestContext;
use crate::domain::task::TaskType;
use crate::errors::DomainError;

/// Closed set of actions the butler may take on a guest's behalf. Unknown
/// action types are rejected at the parse boundary rather than coerced to a
/// default.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendResponse,
    CreateHousekeepingTask,
    CreateMaintenanceTask,
    CreateConciergeTask,
    CreateRoomServiceTask,
    CreateServiceTask,
    IssueRefund,
    OfferDiscount,
    SendMarketingMessage,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        Self::SendResponse,
        Self::CreateHousekeepingTask,
        Self::CreateMaintenanceTask,
        Self::CreateConciergeTask,
        Self::CreateRoomServiceTask,
        Self::CreateServiceTask,
        Self::IssueRefund,
        Self::OfferDiscount,
        Self::SendMarketingMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendResponse => "send_response",
            Self::CreateHousekeepingTask => "create_housekeeping_task",
            Self::CreateMaintenanceTask => "create_maintenance_task",
            Self::CreateConciergeTask => "create_concierge_task",
            Self::CreateRoomServiceTask => "create_room_service_task",
            Self::CreateServiceTask => "create_service_task",
            Self::IssueRefund => "issue_refund",
            Self::OfferDiscount => "offer_discount",
            Self::SendMarketingMessage => "send_marketing_message",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == raw)
            .ok_or_else(|| DomainError::UnknownActionType(raw.to_string()))
    }

    /// Task creation actions map one-to-one onto the router's task types so
    /// each department can carry its own automation level.
    pub fn for_task_type(task_type: TaskType) -> Self {
        match task_type {
            TaskType::Housekeeping => Self::CreateHousekeepingTask,
            TaskType::Maintenance => Self::CreateMaintenanceTask,
            TaskType::Concierge => Self::CreateConciergeTask,
            TaskType::RoomService => Self::CreateRoomServiceTask,
            TaskType::Other => Self::CreateServiceTask,
        }
    }

    /// Financial actions default to approval-required even when the global
    /// default says otherwise.
    pub fn is_financial(&self) -> bool {
        matches!(self, Self::IssueRefund | Self::OfferDiscount | Self::SendMarketingMessage)
    }
}

/// L1 = staff approval required before execution, L2 = execute immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationLevel {
    L1,
    L2,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub level: Option<AutomationLevel>,
    pub max_auto_amount: Option<Decimal>,
    pub max_auto_percent: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// At or above this, a confidence-gated action is auto-eligible.
    pub approval: f32,
    /// At or above this, a classification is treated as urgent.
    pub urgent: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self { approval: 0.7, urgent: 0.9 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceDecision {
    Auto,
    ApprovalRequired,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutonomySettings {
    pub default_level: AutomationLevel,
    pub actions: BTreeMap<ActionType, ActionConfig>,
    pub confidence_thresholds: ConfidenceThresholds,
}

impl Default for AutonomySettings {
    fn default() -> Self {
        // Financial actions carry explicit L1 overrides so that raising the
        // global default to L2 never silently enables money-moving actions.
        let mut actions = BTreeMap::new();
        for action in ActionType::ALL {
            if action.is_financial() {
                actions.insert(
                    action,
                    ActionConfig { level: Some(AutomationLevel::L1), ..ActionConfig::default() },
                );
            }
        }

        Self {
            default_level: AutomationLevel::L1,
            actions,
            confidence_thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl AutonomySettings {
    /// Effective automation level for an action: the per-action override when
    /// set, otherwise the global default.
    pub fn level_for(&self, action: ActionType) -> AutomationLevel {
        self.actions
            .get(&action)
            .and_then(|config| config.level)
            .unwrap_or(self.default_level)
    }

    /// Whether the action may run without staff review. The guest context is
    /// part of the signature for extensibility; current policy branches only
    /// on the configured level.
    pub fn can_auto_execute(&self, action: ActionType, _context: Option<&GuestContext>) -> bool {
        self.level_for(action) == AutomationLevel::L2
    }

    /// Confidence gate. The boundary is inclusive: exactly-at-threshold is
    /// auto-eligible.
    pub fn decide_by_confidence(&self, confidence: f32) -> ConfidenceDecision {
        if confidence >= self.confidence_thresholds.approval {
            ConfidenceDecision::Auto
        } else {
            ConfidenceDecision::ApprovalRequired
        }
    }

    pub fn is_urgent_confidence(&self, confidence: f32) -> bool {
        confidence >= self.confidence_thresholds.urgent
    }

    /// Financial gate on absolute amounts. An unset limit means zero: no
    /// financial auto-approval unless a limit was deliberately configured.
    pub fn can_auto_approve_amount(&self, action: ActionType, amount: Decimal) -> bool {
        let limit = self
            .actions
            .get(&action)
            .and_then(|config| config.max_auto_amount)
            .unwrap_or(Decimal::ZERO);
        amount <= limit
    }

    /// Financial gate on percentages, same unset-means-zero rule.
    pub fn can_auto_approve_percent(&self, action: ActionType, percent: Decimal) -> bool {
        let limit = self
            .actions
            .get(&action)
            .and_then(|config| config.max_auto_percent)
            .unwrap_or(Decimal::ZERO);
        percent <= limit
    }

    /// Validation applied on save. Settings are replaced wholesale, so the
    /// incoming document must be complete and self-consistent.
    pub fn validate(&self) -> Result<(), DomainError> {
        let thresholds = &self.confidence_thresholds;
        for (name, value) in [("approval", thresholds.approval), ("urgent", thresholds.urgent)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvariantViolation(format!(
                    "confidence threshold `{name}` must be within 0..=1, got {value}"
                )));
            }
        }

        for (action, config) in &self.actions {
            for (field, limit) in [
                ("max_auto_amount", config.max_auto_amount),
                ("max_auto_percent", config.max_auto_percent),
            ] {
                if let Some(limit) = limit {
                    if limit < Decimal::ZERO {
                        return Err(DomainError::InvariantViolation(format!(
                            "{field} for `{}` must not be negative",
                            action.as_str()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
