use serde::{Deserialize, Serialize};

/// Department a classified message belongs to. Closed set: the router maps
/// these onto task types deterministically, so an open string would defeat
/// the triage guarantees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Housekeeping,
    Maintenance,
    Concierge,
    RoomService,
    FrontDesk,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Housekeeping => "housekeeping",
            Self::Maintenance => "maintenance",
            Self::Concierge => "concierge",
            Self::RoomService => "room_service",
            Self::FrontDesk => "front_desk",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "housekeeping" => Some(Self::Housekeeping),
            "maintenance" => Some(Self::Maintenance),
            "concierge" => Some(Self::Concierge),
            "room_service" => Some(Self::RoomService),
            "front_desk" => Some(Self::FrontDesk),
            _ => None,
        }
    }
}

/// Output of the intent classifier collaborator. Produced fresh per inbound
/// message and never persisted on its own; the generator embeds it in
/// response metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: String,
    pub confidence: f32,
    pub department: Option<Department>,
    pub requires_action: bool,
}

impl ClassificationResult {
    pub const UNKNOWN_INTENT: &'static str = "unknown";

    /// Null classification: the classifier could not tell what the guest
    /// wants. Never actionable.
    pub fn unknown() -> Self {
        Self {
            intent: Self::UNKNOWN_INTENT.to_string(),
            confidence: 0.0,
            department: None,
            requires_action: false,
        }
    }

    /// A classification is actionable when the classifier flagged it for
    /// action and could name a department.
    pub fn is_actionable(&self) -> bool {
        self.requires_action && self.department.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassificationResult, Department};

    #[test]
    fn unknown_classification_is_never_actionable() {
        let unknown = ClassificationResult::unknown();
        assert_eq!(unknown.intent, "unknown");
        assert!(!unknown.is_actionable());
    }

    #[test]
    fn actionable_requires_both_flag_and_department() {
        let mut classification = ClassificationResult {
            intent: "request.housekeeping.towels".to_string(),
            confidence: 0.9,
            department: Some(Department::Housekeeping),
            requires_action: true,
        };
        assert!(classification.is_actionable());

        classification.department = None;
        assert!(!classification.is_actionable());

        classification.department = Some(Department::Housekeeping);
        classification.requires_action = false;
        assert!(!classification.is_actionable());
    }

    #[test]
    fn department_round_trips_through_str() {
        for department in [
            Department::Housekeeping,
            Department::Maintenance,
            Department::Concierge,
            Department::RoomService,
            Department::FrontDesk,
        ] {
            assert_eq!(Department::parse(department.as_str()), Some(department));
        }
        assert_eq!(Department::parse("spa"), None);
    }
}
