//! Branching narrative games.
//!
//! A game is a graph of scenes. Clients author scenes under their own string
//! keys; creation resolves those keys into [`SceneId`]s and validates the graph.
//! An answer is the list of choice indices taken from the first scene until an
//! end scene is reached.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_auth::Role;
use kidsbook_core::{DomainError, DomainResult, Entity, GameId, GroupId, SceneId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Authoring input
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub speech: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub text: String,
    #[serde(default)]
    pub tag: String,
    /// Key of the scene this choice leads to.
    #[serde(default)]
    pub pathway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub key: String,
    #[serde(default)]
    pub is_end: bool,
    #[serde(default)]
    pub choices: Vec<ChoiceSpec>,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGame {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub preface: String,
    pub first_scene: String,
    #[serde(default)]
    pub last_scene: Option<String>,
    #[serde(default)]
    pub threshold: u16,
    pub scenes: Vec<SceneSpec>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored model
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub tag: String,
    pub pathway: Option<SceneId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScene {
    pub id: SceneId,
    pub game: GameId,
    pub is_end: bool,
    pub choices: Vec<Choice>,
    pub dialogue: Vec<DialogueLine>,
}

/// `answers[scene][choice index]` counts, plus the number of completed plays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub num_of_responses: u32,
    pub answers: BTreeMap<SceneId, Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub group: GroupId,
    pub creator: UserId,
    pub title: String,
    pub preface: String,
    pub first_scene: SceneId,
    pub last_scene: Option<SceneId>,
    pub threshold: u16,
    pub stats: GameStats,
    pub created_at: DateTime<Utc>,
}

impl Entity for Game {
    type Id = GameId;

    fn id(&self) -> GameId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A user's play-through. Unique per (user, game).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAnswer {
    pub user: UserId,
    pub game: GameId,
    pub answers: Vec<usize>,
    pub ending: String,
    pub created_at: DateTime<Utc>,
}

/// Result of walking a list of choices through the scene graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    /// (scene, choice index) for every step taken.
    pub steps: Vec<(SceneId, usize)>,
    pub end: SceneId,
    pub ending: String,
}

impl Game {
    /// Resolve scene keys, validate the graph and build the stored rows.
    pub fn create(
        cmd: CreateGame,
        group: GroupId,
        creator: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<(Self, Vec<GameScene>)> {
        if cmd.scenes.is_empty() {
            return Err(DomainError::validation("a game needs at least one scene"));
        }

        let mut ids: HashMap<&str, SceneId> = HashMap::new();
        for spec in &cmd.scenes {
            if ids.insert(spec.key.as_str(), SceneId::new()).is_some() {
                return Err(DomainError::validation(format!("duplicate scene key '{}'", spec.key)));
            }
        }
        let resolve = |key: &str| {
            ids.get(key)
                .copied()
                .ok_or_else(|| DomainError::validation(format!("unknown scene '{key}'")))
        };

        let game_id = GameId::new();
        let mut scenes = Vec::with_capacity(cmd.scenes.len());
        for spec in &cmd.scenes {
            if !spec.is_end && spec.choices.is_empty() {
                return Err(DomainError::validation(format!(
                    "scene '{}' is not an end scene but has no choices",
                    spec.key
                )));
            }
            let mut choices = Vec::with_capacity(spec.choices.len());
            for c in &spec.choices {
                let pathway = match (&c.pathway, spec.is_end) {
                    (Some(key), _) => Some(resolve(key)?),
                    (None, true) => None,
                    (None, false) => {
                        return Err(DomainError::validation(format!(
                            "choice '{}' in scene '{}' leads nowhere",
                            c.text, spec.key
                        )));
                    }
                };
                choices.push(Choice {
                    text: c.text.clone(),
                    tag: c.tag.clone(),
                    pathway,
                });
            }
            scenes.push(GameScene {
                id: resolve(&spec.key)?,
                game: game_id,
                is_end: spec.is_end,
                choices,
                dialogue: spec.dialogue.clone(),
            });
        }

        if !scenes.iter().any(|s| s.is_end) {
            return Err(DomainError::validation("a game needs at least one end scene"));
        }

        let first_scene = resolve(&cmd.first_scene)?;
        let last_scene = cmd.last_scene.as_deref().map(resolve).transpose()?;
        let stats = GameStats {
            num_of_responses: 0,
            answers: scenes
                .iter()
                .filter(|s| !s.is_end)
                .map(|s| (s.id, vec![0; s.choices.len()]))
                .collect(),
        };

        let game = Self {
            id: game_id,
            group,
            creator,
            title: cmd.title,
            preface: cmd.preface,
            first_scene,
            last_scene,
            threshold: cmd.threshold,
            stats,
            created_at: occurred_at,
        };
        Ok((game, scenes))
    }

    /// Follow `answers` from the first scene. The walk must land on an end
    /// scene exactly when the answers run out.
    pub fn walk(&self, scenes: &BTreeMap<SceneId, GameScene>, answers: &[usize]) -> DomainResult<Walk> {
        let mut current = self.first_scene;
        let mut steps = Vec::with_capacity(answers.len());
        let mut last_tag = String::new();

        for (step, idx) in answers.iter().enumerate() {
            let scene = scenes
                .get(&current)
                .ok_or_else(|| DomainError::not_found("scene"))?;
            if scene.is_end {
                return Err(DomainError::validation(format!(
                    "reached an end scene after {step} choices but {} were given",
                    answers.len()
                )));
            }
            let choice = scene.choices.get(*idx).ok_or_else(|| {
                DomainError::validation(format!("choice {idx} does not exist at step {step}"))
            })?;
            let next = choice
                .pathway
                .ok_or_else(|| DomainError::validation(format!("choice {idx} at step {step} leads nowhere")))?;
            steps.push((scene.id, *idx));
            last_tag = choice.tag.clone();
            current = next;
        }

        let end = scenes
            .get(&current)
            .ok_or_else(|| DomainError::not_found("scene"))?;
        if !end.is_end {
            return Err(DomainError::validation("the choices do not reach an end scene"));
        }

        let ending = end
            .dialogue
            .iter()
            .map(|d| d.tag.as_str())
            .find(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or(last_tag);

        Ok(Walk {
            steps,
            end: end.id,
            ending,
        })
    }

    pub fn record_walk(&mut self, walk: &Walk) {
        for (scene, idx) in &walk.steps {
            if let Some(c) = self.stats.answers.get_mut(scene).and_then(|v| v.get_mut(*idx)) {
                *c += 1;
            }
        }
        self.stats.num_of_responses += 1;
    }
}

/// Game as listed; stats only for teachers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub id: GameId,
    pub creator: UserId,
    pub group: GroupId,
    pub title: String,
    pub preface: String,
    pub first_scene: SceneId,
    pub last_scene: Option<SceneId>,
    pub threshold: u16,
    pub scenes: Vec<GameScene>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<GameStats>,
}

impl GameView {
    pub fn project(game: &Game, scenes: Vec<GameScene>, viewer: Role) -> Self {
        Self {
            id: game.id,
            creator: game.creator,
            group: game.group,
            title: game.title.clone(),
            preface: game.preface.clone(),
            first_scene: game.first_scene,
            last_scene: game.last_scene,
            threshold: game.threshold,
            scenes,
            stats: viewer.sees_stats().then(|| game.stats.clone()),
        }
    }
}
