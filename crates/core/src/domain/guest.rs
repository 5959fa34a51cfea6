use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestProfile {
    pub id: GuestId,
    pub full_name: String,
    pub language: Option<String>,
    pub vip: bool,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSummary {
    pub id: ReservationId,
    pub room_number: Option<String>,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub party_size: u32,
}

/// Stay phase derived from the reservation window, used for prompt assembly
/// and for the audit summary attached to generated responses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StayPhase {
    Arriving { days_until_check_in: i64 },
    CheckedIn { nights_remaining: i64 },
    CheckedOut,
}

impl ReservationSummary {
    pub fn stay_phase(&self, now: DateTime<Utc>) -> StayPhase {
        if now < self.check_in {
            let days = (self.check_in - now).num_days().max(0);
            StayPhase::Arriving { days_until_check_in: days }
        } else if now < self.check_out {
            let nights = (self.check_out - now).num_days().max(0);
            StayPhase::CheckedIn { nights_remaining: nights }
        } else {
            StayPhase::CheckedOut
        }
    }
}

/// Everything the pipeline knows about who is on the other end of the
/// conversation. Both fields are optional: anonymous channels produce a
/// context with neither.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestContext {
    pub profile: Option<GuestProfile>,
    pub reservation: Option<ReservationSummary>,
}

impl GuestContext {
    pub fn guest_id(&self) -> Option<&GuestId> {
        self.profile.as_ref().map(|profile| &profile.id)
    }

    /// Guest-specific conversations must never be served from the shared
    /// response cache; a profile is what makes a conversation guest-specific.
    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{GuestContext, ReservationId, ReservationSummary, StayPhase};

    fn reservation(check_in_offset_days: i64, check_out_offset_days: i64) -> ReservationSummary {
        let now = Utc::now();
        ReservationSummary {
            id: ReservationId("R-100".to_string()),
            room_number: Some("412".to_string()),
            check_in: now + Duration::days(check_in_offset_days),
            check_out: now + Duration::days(check_out_offset_days),
            party_size: 2,
        }
    }

    #[test]
    fn stay_phase_before_check_in_is_arriving() {
        let phase = reservation(3, 7).stay_phase(Utc::now());
        assert!(matches!(phase, StayPhase::Arriving { days_until_check_in: 2..=3 }));
    }

    #[test]
    fn stay_phase_during_stay_counts_remaining_nights() {
        let phase = reservation(-2, 3).stay_phase(Utc::now());
        assert!(matches!(phase, StayPhase::CheckedIn { nights_remaining: 2..=3 }));
    }

    #[test]
    fn stay_phase_after_check_out() {
        let phase = reservation(-7, -1).stay_phase(Utc::now());
        assert_eq!(phase, StayPhase::CheckedOut);
    }

    #[test]
    fn empty_context_has_no_profile() {
        assert!(!GuestContext::default().has_profile());
    }
}
