use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use kidsbook_core::{GameId, GroupId};
use kidsbook_infra::Services;

use crate::app::dto::{self, JsonObject};
use crate::app::errors::{ApiResult, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/group/:id/games/", get(list_games).post(create_game))
        .route("/game/:id/answer/", post(answer_game))
}

pub async fn list_games(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.list_games(caller.session(), group)?)
}

pub async fn create_game(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.create_game(caller.session(), group, &body)?)
}

pub async fn answer_game(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let game: GameId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.answer_game(caller.session(), game, &body)?)
}
