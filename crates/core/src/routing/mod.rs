//! Intent-to-task routing. Deliberately a fixed lookup table, never an AI
//! call, so triage stays deterministic even when classification is noisy.

use serde::{Deserialize, Serialize};

use crate::domain::classification::{ClassificationResult, Department};
use crate::domain::guest::GuestContext;
use crate::domain::task::{NewServiceTask, TaskPriority, TaskType};

/// Minimum classifier confidence for a classification to be routable. This
/// is an eligibility gate for task creation, distinct from the autonomy
/// engine's approval threshold.
pub const ACTIONABILITY_FLOOR: f32 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub should_create_task: bool,
    pub department: Option<Department>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub description: Option<String>,
}

impl RoutingDecision {
    pub fn skip() -> Self {
        Self {
            should_create_task: false,
            department: None,
            task_type: None,
            priority: None,
            description: None,
        }
    }

    /// Materializes the decision into a task proposal. `None` when the
    /// decision was a skip.
    pub fn into_task(self, context: &GuestContext) -> Option<NewServiceTask> {
        if !self.should_create_task {
            return None;
        }
        Some(NewServiceTask {
            department: self.department?,
            task_type: self.task_type?,
            priority: self.priority?,
            description: self.description.unwrap_or_default(),
            guest_id: context.guest_id().cloned(),
            conversation_id: None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TaskRouter;

impl TaskRouter {
    pub fn new() -> Self {
        Self
    }

    /// Full routing decision for an actionable classification.
    pub fn route(
        &self,
        classification: &ClassificationResult,
        context: &GuestContext,
    ) -> RoutingDecision {
        if !self.is_routable(classification) {
            return RoutingDecision::skip();
        }

        // is_routable guarantees the department is present.
        let Some(department) = classification.department else {
            return RoutingDecision::skip();
        };

        RoutingDecision {
            should_create_task: true,
            department: Some(department),
            task_type: Some(task_type_for(department)),
            priority: Some(priority_for(&classification.intent, department)),
            description: Some(describe(classification, context)),
        }
    }

    /// Thin wrapper that short-circuits non-actionable classifications
    /// without computing a full decision. Same policy as `route`.
    pub fn process(
        &self,
        classification: &ClassificationResult,
        context: &GuestContext,
    ) -> RoutingDecision {
        if !self.is_routable(classification) {
            return RoutingDecision::skip();
        }
        self.route(classification, context)
    }

    fn is_routable(&self, classification: &ClassificationResult) -> bool {
        classification.is_actionable() && classification.confidence >= ACTIONABILITY_FLOOR
    }
}

fn task_type_for(department: Department) -> TaskType {
    match department {
        Department::Housekeeping => TaskType::Housekeeping,
        Department::Maintenance => TaskType::Maintenance,
        Department::Concierge => TaskType::Concierge,
        Department::RoomService => TaskType::RoomService,
        Department::FrontDesk => TaskType::Other,
    }
}

fn priority_for(intent: &str, department: Department) -> TaskPriority {
    if intent.starts_with("emergency") {
        return TaskPriority::Urgent;
    }
    if intent.contains("complaint") {
        return TaskPriority::High;
    }
    if department == Department::Maintenance {
        return TaskPriority::High;
    }
    TaskPriority::Standard
}

fn describe(classification: &ClassificationResult, context: &GuestContext) -> String {
    let mut description = format!("Guest request classified as `{}`", classification.intent);
    if let Some(room) = context
        .reservation
        .as_ref()
        .and_then(|reservation| reservation.room_number.as_deref())
    {
        description.push_str(&format!(" (room {room})"));
    }
    description
}
