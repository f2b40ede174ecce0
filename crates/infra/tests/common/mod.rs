//! Shared fixture: a fully wired service layer over the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Map, Value, json};

use kidsbook_auth::{CredentialService, Hs256Jwt, InMemoryTokenBlacklist, Role, Session};
use kidsbook_content::NoopCensor;
use kidsbook_core::{GroupId, UserId};
use kidsbook_events::{EventBus, InMemoryEventBus, PushEnvelope, Subscription};
use kidsbook_infra::{JwtCredentialService, Services, Store};
use kidsbook_notifications::{EventBusPushSink, Notification};

pub type PushBus = InMemoryEventBus<PushEnvelope<Notification>>;

pub struct Harness {
    pub services: Services,
    pub bus: Arc<PushBus>,
    pub pushes: Subscription<PushEnvelope<Notification>>,
    pub teacher: Actor,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
    pub session: Session,
}

impl Actor {
    pub fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }
}

pub fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

impl Harness {
    pub fn new() -> anyhow::Result<Self> {
        let store = Arc::new(Store::in_memory());
        let credentials = Arc::new(JwtCredentialService::new(
            Hs256Jwt::new("integration-secret", chrono::Duration::minutes(30)),
            Arc::new(InMemoryTokenBlacklist::new()),
            store.clone(),
        ));
        let bus: Arc<PushBus> = Arc::new(InMemoryEventBus::new());
        // Subscribe before anything is published.
        let pushes = bus.subscribe();
        let services = Services::new(
            store,
            credentials,
            Arc::new(EventBusPushSink::new(bus.clone())),
            Arc::new(NoopCensor),
        );

        let bootstrap = services.bootstrap_teacher("alice", "alice@school.org")?;
        anyhow::ensure!(bootstrap.created, "fresh store already had a teacher");
        let alice = bootstrap.teacher;
        let session = services.credentials().resolve(&bootstrap.token)?;
        let teacher = Actor {
            id: alice.id,
            role: alice.role,
            session,
        };

        Ok(Self {
            services,
            bus,
            pushes,
            teacher,
        })
    }

    pub fn login(&self, id: UserId, role: Role) -> anyhow::Result<Session> {
        let token = self.services.credentials().issue(id, role)?;
        Ok(self.services.credentials().resolve(&token)?)
    }

    /// Register through the bootstrap teacher and log the new user in.
    pub fn register(&self, kind: &str, name: &str, teacher: Option<UserId>) -> anyhow::Result<Actor> {
        let mut payload = json!({
            "type": kind,
            "username": name,
            "email_address": format!("{name}@school.org"),
            "realname": name,
        });
        if let Some(t) = teacher {
            payload["teacher"] = json!(t.to_string());
        }
        let profile = self
            .services
            .register_user(self.teacher.session(), &body(payload))?;
        Ok(Actor {
            id: profile.id,
            role: profile.role,
            session: self.login(profile.id, profile.role)?,
        })
    }

    pub fn student(&self, name: &str) -> anyhow::Result<Actor> {
        self.register("USER", name, Some(self.teacher.id))
    }

    pub fn create_group(&self, by: &Actor, name: &str) -> anyhow::Result<GroupId> {
        let group = self
            .services
            .create_group(by.session(), &body(json!({ "name": name })))?;
        Ok(group.id)
    }

    pub fn post(&self, by: &Actor, group: GroupId, content: &str) -> anyhow::Result<kidsbook_core::PostId> {
        let view = self
            .services
            .create_post(by.session(), group, &body(json!({ "content": content })))?;
        Ok(view.id)
    }
}
