use kidsbook_auth::{Action, ResourceRef, Session, authorize};
use kidsbook_notifications::{Notification, UnseenCount};

use super::{ServiceResult, Services};

impl Services {
    /// The caller's notifications, newest first.
    pub fn list_notifications(&self, session: Option<&Session>) -> ServiceResult<Vec<Notification>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListNotifications, &ResourceRef::Global, t)?;
            Ok(t.notifications_for(caller.user_id).into_iter().cloned().collect())
        })
    }

    pub fn unseen_count(&self, session: Option<&Session>) -> ServiceResult<UnseenCount> {
        self.query(|t| {
            let caller = authorize(session, Action::ListNotifications, &ResourceRef::Global, t)?;
            Ok(t.unseen(caller.user_id))
        })
    }

    pub fn reset_unseen(&self, session: Option<&Session>) -> ServiceResult<UnseenCount> {
        self.command(|t| {
            let caller = authorize(session, Action::ResetUnseenNotifications, &ResourceRef::Global, &*t)?;
            t.reset_unseen(caller.user_id);
            Ok(t.unseen(caller.user_id))
        })
    }
}
