//! Prompt assembly for the completion provider: one system message built
//! from the persona, guest/reservation context, knowledge blocks, and intent
//! annotation, followed by the bounded conversation history and the current
//! inbound message.

use chrono::{DateTime, Utc};

use maitred_core::domain::classification::ClassificationResult;
use maitred_core::domain::guest::{GuestContext, StayPhase};
use maitred_core::domain::knowledge::KnowledgeMatch;
use maitred_core::domain::message::{Message, MessageDirection};

use crate::providers::ChatMessage;

const PERSONA_PREAMBLE: &str = "You are the hotel's digital butler. You answer guest messages \
warmly, concisely, and accurately. Only state facts you can ground in the provided hotel \
knowledge or reservation details; when unsure, offer to check with staff rather than guess. \
Never discuss internal policies, other guests, or pricing you were not given.";

pub fn assemble_messages(
    guest: Option<&GuestContext>,
    knowledge: &[KnowledgeMatch],
    classification: Option<&ClassificationResult>,
    history: &[Message],
    current_message: &str,
    now: DateTime<Utc>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(guest, knowledge, classification, now)));

    for entry in history {
        messages.push(match entry.direction {
            MessageDirection::Inbound => ChatMessage::user(entry.content.clone()),
            MessageDirection::Outbound => ChatMessage::assistant(entry.content.clone()),
        });
    }

    // The conversation collaborator may already have persisted the inbound
    // message; appending it again would duplicate the turn.
    let already_last = history
        .last()
        .map(|entry| {
            entry.direction == MessageDirection::Inbound && entry.content == current_message
        })
        .unwrap_or(false);
    if !already_last {
        messages.push(ChatMessage::user(current_message.to_string()));
    }

    messages
}

fn system_prompt(
    guest: Option<&GuestContext>,
    knowledge: &[KnowledgeMatch],
    classification: Option<&ClassificationResult>,
    now: DateTime<Utc>,
) -> String {
    let mut prompt = String::from(PERSONA_PREAMBLE);

    if let Some(profile) = guest.and_then(|context| context.profile.as_ref()) {
        prompt.push_str("\n\nGuest profile:\n");
        prompt.push_str(&format!("- Name: {}\n", profile.full_name));
        if profile.vip {
            prompt.push_str("- VIP guest\n");
        }
        if let Some(language) = &profile.language {
            prompt.push_str(&format!("- Preferred language: {language}\n"));
        }
        if let Some(notes) = &profile.notes {
            prompt.push_str(&format!("- Notes: {notes}\n"));
        }
    }

    if let Some(reservation) = guest.and_then(|context| context.reservation.as_ref()) {
        prompt.push_str("\nReservation:\n");
        if let Some(room) = &reservation.room_number {
            prompt.push_str(&format!("- Room {room}\n"));
        }
        prompt.push_str(&format!("- Party of {}\n", reservation.party_size));
        let stay_line = match reservation.stay_phase(now) {
            StayPhase::Arriving { days_until_check_in } => {
                format!("- Arriving in {days_until_check_in} day(s)\n")
            }
            StayPhase::CheckedIn { nights_remaining } => {
                format!("- Checked in, {nights_remaining} night(s) remaining\n")
            }
            StayPhase::CheckedOut => "- Checked out\n".to_string(),
        };
        prompt.push_str(&stay_line);
    }

    for item in knowledge {
        prompt.push_str(&format!("\nHotel knowledge - {}:\n{}\n", item.title, item.content));
    }

    if let Some(classification) = classification {
        prompt.push_str(&format!("\nDetected guest intent: {}\n", classification.intent));
    }

    prompt
}
