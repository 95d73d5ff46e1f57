use serde::{Deserialize, Serialize};

use crate::config::{Messages, fill};
use crate::snapshot::LiveTicket;

/// Why a ticket is worth a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Not present in the previous snapshot.
    NewTicket,
    /// Became owned by the current agent.
    NewAssignment,
    /// Owned ticket whose `updated_at` advanced.
    NewReply,
}

/// One notification-worthy change. Produced per cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub title: String,
    pub body: String,
    /// Deep-link payload.
    pub ticket_id: i64,
    pub ticket_number: String,
    pub ticket_title: String,
}

impl NotificationEvent {
    /// Build the event for `ticket`, rendering text from `messages`.
    pub fn render(kind: EventKind, ticket: &LiveTicket, messages: &Messages) -> Self {
        let (title_tpl, body_tpl) = match kind {
            EventKind::NewTicket => (&messages.new_ticket_title, &messages.new_ticket_body),
            EventKind::NewAssignment => (&messages.assignment_title, &messages.assignment_body),
            EventKind::NewReply => (&messages.reply_title, &messages.reply_body),
        };
        Self {
            kind,
            title: fill(title_tpl, &ticket.number, &ticket.title, 1),
            body: fill(body_tpl, &ticket.number, &ticket.title, 1),
            ticket_id: ticket.id,
            ticket_number: ticket.number.clone(),
            ticket_title: ticket.title.clone(),
        }
    }
}
