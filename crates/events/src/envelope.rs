use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kidsbook_core::UserId;

/// Envelope for a push message addressed to one user.
///
/// This is the unit that travels on the bus; `payload` is the serialised
/// notification (or any other event) destined for `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEnvelope<E> {
    event_id: Uuid,
    recipient: UserId,
    event_type: String,
    payload: E,
}

impl<E> PushEnvelope<E> {
    pub fn new(recipient: UserId, event_type: impl Into<String>, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            recipient,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn recipient(&self) -> UserId {
        self.recipient
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: crate::Event> PushEnvelope<E> {
    /// Wrap an event, taking its type name from the event itself.
    pub fn for_event(recipient: UserId, event: E) -> Self {
        let event_type = event.event_type();
        Self::new(recipient, event_type, event)
    }
}
