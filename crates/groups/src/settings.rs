//! Per-group feature toggles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use kidsbook_core::coerce::coerce_bool;
use kidsbook_core::{DomainError, DomainResult};

/// One-to-one with a group (keyed by the group id in the store); removed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub is_like_enabled: bool,
    pub is_comment_enabled: bool,
    pub is_share_enabled: bool,
    pub is_flag_enabled: bool,
    pub enable_reflection: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            is_like_enabled: true,
            is_comment_enabled: true,
            is_share_enabled: true,
            is_flag_enabled: true,
            enable_reflection: false,
        }
    }
}

impl GroupSettings {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Like => self.is_like_enabled,
            Feature::Comment => self.is_comment_enabled,
            Feature::Share => self.is_share_enabled,
            Feature::Flag => self.is_flag_enabled,
        }
    }

    /// Gate a content action on its toggle. Applies to every role.
    pub fn ensure_enabled(&self, feature: Feature) -> DomainResult<()> {
        if self.is_enabled(feature) {
            Ok(())
        } else {
            Err(DomainError::feature_disabled(feature.disabled_message()))
        }
    }
}

/// Content features that can be switched off per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Like,
    Comment,
    Share,
    Flag,
}

impl Feature {
    pub fn disabled_message(&self) -> &'static str {
        match self {
            Feature::Like => "Liking is disabled for this group",
            Feature::Comment => "Commenting is disabled for this group",
            Feature::Share => "Sharing is disabled for this group",
            Feature::Flag => "Flagging is disabled for this group",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Partial update
// ─────────────────────────────────────────────────────────────────────────────

/// The static table of updatable settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    IsLikeEnabled,
    IsCommentEnabled,
    IsShareEnabled,
    IsFlagEnabled,
    EnableReflection,
}

impl SettingField {
    pub const ALL: [SettingField; 5] = [
        SettingField::IsLikeEnabled,
        SettingField::IsCommentEnabled,
        SettingField::IsShareEnabled,
        SettingField::IsFlagEnabled,
        SettingField::EnableReflection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SettingField::IsLikeEnabled => "is_like_enabled",
            SettingField::IsCommentEnabled => "is_comment_enabled",
            SettingField::IsShareEnabled => "is_share_enabled",
            SettingField::IsFlagEnabled => "is_flag_enabled",
            SettingField::EnableReflection => "enable_reflection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn slot<'a>(&self, settings: &'a mut GroupSettings) -> &'a mut bool {
        match self {
            SettingField::IsLikeEnabled => &mut settings.is_like_enabled,
            SettingField::IsCommentEnabled => &mut settings.is_comment_enabled,
            SettingField::IsShareEnabled => &mut settings.is_share_enabled,
            SettingField::IsFlagEnabled => &mut settings.is_flag_enabled,
            SettingField::EnableReflection => &mut settings.enable_reflection,
        }
    }
}

/// A fully parsed settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    changes: Vec<(SettingField, bool)>,
}

impl SettingsPatch {
    /// Parse every known field before anything is applied.
    ///
    /// Unknown names are ignored; a known field with a non-boolean value
    /// rejects the whole patch.
    pub fn parse(body: &Map<String, Value>) -> DomainResult<Self> {
        let mut changes = Vec::new();
        for (name, value) in body {
            if let Some(field) = SettingField::from_name(name) {
                changes.push((field, coerce_bool(name, value)?));
            }
        }
        Ok(Self { changes })
    }

    pub fn set(mut self, field: SettingField, value: bool) -> Self {
        self.changes.push((field, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn apply(&self, settings: &mut GroupSettings) {
        for (field, value) in &self.changes {
            *field.slot(settings) = *value;
        }
    }
}
