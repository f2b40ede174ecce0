//! Push delivery of committed notifications.

use kidsbook_events::{EventBus, PushEnvelope};
use thiserror::Error;

use crate::Notification;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push transport failed: {0}")]
    Transport(String),
}

/// Best-effort delivery of one notification to its recipient.
pub trait PushSink: Send + Sync {
    fn push(&self, notification: &Notification) -> Result<(), PushError>;
}

/// Publishes notifications on an in-process bus; live consumers (the API's
/// push relay) subscribe to it.
pub struct EventBusPushSink<B> {
    bus: B,
}

impl<B> EventBusPushSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> PushSink for EventBusPushSink<B>
where
    B: EventBus<PushEnvelope<Notification>>,
{
    fn push(&self, notification: &Notification) -> Result<(), PushError> {
        self.bus
            .publish(PushEnvelope::for_event(notification.user, notification.clone()))
            .map_err(|e| PushError::Transport(format!("{e:?}")))
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPushSink;

impl PushSink for NoopPushSink {
    fn push(&self, _notification: &Notification) -> Result<(), PushError> {
        Ok(())
    }
}

/// Push every notification; failures are logged and never propagated.
///
/// Returns how many were delivered.
pub fn deliver_after_commit(sink: &dyn PushSink, committed: &[Notification]) -> usize {
    let mut delivered = 0;
    for n in committed {
        match sink.push(n) {
            Ok(()) => delivered += 1,
            Err(err) => tracing::warn!(
                notification_id = %n.id,
                user_id = %n.user,
                error = %err,
                "push delivery failed"
            ),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kidsbook_core::{GroupId, UserId};
    use kidsbook_events::InMemoryEventBus;
    use std::sync::Arc;

    use crate::NotificationDraft;

    struct Failing;

    impl PushSink for Failing {
        fn push(&self, _n: &Notification) -> Result<(), PushError> {
            Err(PushError::Transport("offline".into()))
        }
    }

    fn note() -> Notification {
        NotificationDraft::added_to_group(UserId::new(), GroupId::new(), "Math").stamp(Utc::now())
    }

    #[test]
    fn bus_sink_addresses_the_recipient() {
        let bus = Arc::new(InMemoryEventBus::<PushEnvelope<Notification>>::new());
        let sub = bus.subscribe();
        let sink = EventBusPushSink::new(bus.clone());
        let n = note();

        assert_eq!(deliver_after_commit(&sink, std::slice::from_ref(&n)), 1);

        let env = sub.try_recv().unwrap();
        assert_eq!(env.recipient(), n.user);
        assert_eq!(env.event_type(), "notification.created");
        assert_eq!(env.payload(), &n);
    }

    #[test]
    fn failures_are_swallowed() {
        assert_eq!(deliver_after_commit(&Failing, &[note(), note()]), 0);
    }
}
