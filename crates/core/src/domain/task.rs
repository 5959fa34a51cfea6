use serde::{Deserialize, Serialize};

use crate::domain::classification::Department;
use crate::domain::guest::GuestId;
use crate::domain::message::ConversationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Housekeeping,
    Maintenance,
    Concierge,
    RoomService,
    Other,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Housekeeping => "housekeeping",
            Self::Maintenance => "maintenance",
            Self::Concierge => "concierge",
            Self::RoomService => "room_service",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Urgent,
    High,
    Standard,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Standard => "standard",
            Self::Low => "low",
        }
    }
}

/// A service task proposed by the router. Carries everything the task
/// collaborator needs to create the real ticket, so an approved queue item
/// can be executed later without re-deriving anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServiceTask {
    pub department: Department,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub description: String,
    pub guest_id: Option<GuestId>,
    pub conversation_id: Option<ConversationId>,
}
