//! Application services: one method per external action.
//!
//! Every method takes the caller's `Option<&Session>`, authorizes against the
//! tables inside the same read or transaction it serves, and only then parses
//! and applies the request. Notifications are written in the transaction and
//! pushed after it commits.

mod content;
mod games;
mod groups;
mod notifications;
mod surveys;
mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use kidsbook_auth::{AuthzError, BlacklistError, TokenValidationError};
use kidsbook_content::ContentCensor;
use kidsbook_core::coerce::{coerce_opt_string, coerce_string};
use kidsbook_core::{DomainError, DomainResult};
use kidsbook_notifications::{Notification, NotificationDraft, PushSink, deliver_after_commit};

use crate::{JwtCredentialService, Store, StoreError, Tables};

pub use surveys::SurveyFilter;
pub use users::{BootstrapOutcome, UserProfile, VirtualLogin};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenValidationError),

    #[error(transparent)]
    Revocation(#[from] BlacklistError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct Services {
    store: Arc<Store>,
    credentials: Arc<JwtCredentialService>,
    push: Arc<dyn PushSink>,
    censor: Arc<dyn ContentCensor>,
}

impl Services {
    pub fn new(
        store: Arc<Store>,
        credentials: Arc<JwtCredentialService>,
        push: Arc<dyn PushSink>,
        censor: Arc<dyn ContentCensor>,
    ) -> Self {
        Self {
            store,
            credentials,
            push,
            censor,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn credentials(&self) -> &Arc<JwtCredentialService> {
        &self.credentials
    }

    fn query<T>(&self, f: impl FnOnce(&Tables) -> ServiceResult<T>) -> ServiceResult<T> {
        self.store.read(f)?
    }

    fn command<T>(&self, f: impl FnOnce(&mut Tables) -> ServiceResult<T>) -> ServiceResult<T> {
        self.store.transaction(f)
    }

    /// Push what a committed transaction produced. Never fails the action.
    fn deliver(&self, committed: &[Notification]) {
        if committed.is_empty() {
            return;
        }
        let delivered = deliver_after_commit(self.push.as_ref(), committed);
        tracing::debug!(delivered, total = committed.len(), "notifications pushed");
    }
}

/// Persist `drafts` and return the ones whose recipient wants pushes.
fn notify_all(
    t: &mut Tables,
    drafts: impl IntoIterator<Item = NotificationDraft>,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let mut to_push = Vec::new();
    for draft in drafts {
        let notification = t.notify(draft, now);
        let wants_push = t
            .user(notification.user)
            .is_ok_and(|u| u.settings.receive_notifications);
        if wants_push {
            to_push.push(notification);
        }
    }
    to_push
}

fn required_str(body: &Map<String, Value>, field: &str) -> DomainResult<String> {
    let value = body
        .get(field)
        .ok_or_else(|| DomainError::validation(format!("{field} is required")))?;
    coerce_string(field, value)
}

fn optional_str(body: &Map<String, Value>, field: &str) -> DomainResult<Option<String>> {
    body.get(field)
        .map(|v| coerce_opt_string(field, v))
        .transpose()
        .map(Option::flatten)
}
