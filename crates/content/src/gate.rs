//! Content-action gatekeeper.

use serde::Serialize;

use kidsbook_core::DomainResult;
use kidsbook_groups::{Feature, GroupSettings};

/// A content write that is subject to a group toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAction {
    LikePost,
    LikeComment,
    Comment,
    Share,
    FlagPost,
    FlagComment,
}

impl ContentAction {
    pub fn feature(&self) -> Feature {
        match self {
            ContentAction::LikePost | ContentAction::LikeComment => Feature::Like,
            ContentAction::Comment => Feature::Comment,
            ContentAction::Share => Feature::Share,
            ContentAction::FlagPost | ContentAction::FlagComment => Feature::Flag,
        }
    }
}

/// Fail with `FeatureDisabled` when the owning group has switched the action off.
///
/// Role-independent: the group creator is gated like everyone else.
pub fn gate(settings: &GroupSettings, action: ContentAction) -> DomainResult<()> {
    settings.ensure_enabled(action.feature())
}
