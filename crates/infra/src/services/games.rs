use chrono::Utc;
use serde_json::{Map, Value};

use kidsbook_auth::{Action, ResourceRef, Session, authorize};
use kidsbook_content::{CreateGame, Game, GameAnswer, GameView};
use kidsbook_core::{DomainError, GameId, GroupId};

use super::{ServiceResult, Services};

impl Services {
    pub fn list_games(&self, session: Option<&Session>, group: GroupId) -> ServiceResult<Vec<GameView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListGames, &ResourceRef::Group(group), t)?;
            Ok(t.games_in(group)
                .into_iter()
                .map(|g| GameView::project(g, t.scenes_of(g.id).into_values().collect(), caller.role))
                .collect())
        })
    }

    pub fn create_game(
        &self,
        session: Option<&Session>,
        group: GroupId,
        body: &Map<String, Value>,
    ) -> ServiceResult<GameView> {
        self.command(|t| {
            let caller = authorize(session, Action::CreateGame, &ResourceRef::Group(group), &*t)?;
            let cmd: CreateGame = serde_json::from_value(Value::Object(body.clone()))
                .map_err(|e| DomainError::validation(e.to_string()))?;
            let (game, scenes) = Game::create(cmd, group, caller.user_id, Utc::now())?;
            let view = GameView::project(&game, scenes.clone(), caller.role);
            tracing::info!(game_id = %game.id, group_id = %group, scenes = scenes.len(), "game created");
            t.insert_game(game, scenes);
            Ok(view)
        })
    }

    /// Walk the caller's choices; once per user.
    pub fn answer_game(
        &self,
        session: Option<&Session>,
        game: GameId,
        body: &Map<String, Value>,
    ) -> ServiceResult<GameAnswer> {
        self.command(|t| {
            let caller = authorize(session, Action::AnswerGame, &ResourceRef::Game(game), &*t)?;
            if t.has_answered_game(caller.user_id, game) {
                return Err(DomainError::conflict("You have already answered this game.").into());
            }
            let answers: Vec<usize> = body
                .get("answers")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| DomainError::validation(format!("answers: {e}")))?
                .ok_or_else(|| DomainError::validation("answers is required"))?;

            let scenes = t.scenes_of(game);
            let walk = t.game(game)?.walk(&scenes, &answers)?;
            t.game_mut(game)?.record_walk(&walk);

            let answer = GameAnswer {
                user: caller.user_id,
                game,
                answers,
                ending: walk.ending,
                created_at: Utc::now(),
            };
            t.insert_game_answer(answer.clone())?;
            Ok(answer)
        })
    }
}
