//! Allow-listed partial updates of a user's profile and settings.
//!
//! A patch is parsed completely before it is applied, so a bad field leaves
//! the user untouched. Names outside the allow-list are ignored.

use serde_json::{Map, Value};

use kidsbook_core::coerce::{coerce_bool, coerce_opt_string, coerce_string};
use kidsbook_core::DomainResult;

use crate::user::{User, UserSettings, normalize_email, validate_username};

/// Parsed profile changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub realname: Option<String>,
    pub description: Option<String>,
    pub profile_photo: Option<Option<String>>,
    pub email_address: Option<String>,
}

impl ProfilePatch {
    pub const FIELDS: [&'static str; 5] =
        ["username", "realname", "description", "profile_photo", "email_address"];

    pub fn parse(body: &Map<String, Value>) -> DomainResult<Self> {
        let mut patch = Self::default();
        for (name, value) in body {
            match name.as_str() {
                "username" => patch.username = Some(validate_username(&coerce_string(name, value)?)?),
                "realname" => patch.realname = Some(coerce_string(name, value)?.trim().to_string()),
                "description" => patch.description = Some(coerce_string(name, value)?),
                "profile_photo" => patch.profile_photo = Some(coerce_opt_string(name, value)?),
                "email_address" => patch.email_address = Some(normalize_email(&coerce_string(name, value)?)?),
                _ => {}
            }
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.realname {
            user.realname = v;
        }
        if let Some(v) = self.description {
            user.description = v;
        }
        if let Some(v) = self.profile_photo {
            user.profile_photo = v;
        }
        if let Some(v) = self.email_address {
            user.email_address = v;
        }
    }
}

/// Parsed user-settings changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserSettingsPatch {
    pub receive_notifications: Option<bool>,
}

impl UserSettingsPatch {
    pub fn parse(body: &Map<String, Value>) -> DomainResult<Self> {
        let mut patch = Self::default();
        if let Some(value) = body.get("receive_notifications") {
            patch.receive_notifications = Some(coerce_bool("receive_notifications", value)?);
        }
        Ok(patch)
    }

    pub fn apply(self, settings: &mut UserSettings) {
        if let Some(v) = self.receive_notifications {
            settings.receive_notifications = v;
        }
    }
}
