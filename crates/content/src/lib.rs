//! Content store model: posts, comments, reactions, surveys and games.
//!
//! Deterministic domain logic only. Group-scoping and feature toggles are
//! re-checked by the caller through [`gate`] before any reaction is written.

pub mod censor;
pub mod comment;
pub mod game;
pub mod gate;
pub mod post;
pub mod reactions;
pub mod survey;
pub mod view;

pub use censor::{ContentCensor, NoopCensor};
pub use comment::{Comment, CreateComment};
pub use game::{
    Choice, ChoiceSpec, CreateGame, DialogueLine, Game, GameAnswer, GameScene, GameStats, GameView,
    SceneSpec, Walk,
};
pub use gate::{ContentAction, gate};
pub use post::{CreatePost, Post};
pub use reactions::{CommentLike, Flag, PostLike, Share};
pub use survey::{CreateSurvey, Question, Survey, SurveyAnswer, SurveyStats, SurveyView};
pub use view::{CommentView, PostReactions, PostView, project_comment, project_post};
