use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, post},
};

use kidsbook_core::CommentId;
use kidsbook_infra::Services;

use crate::app::dto::{self, JsonObject};
use crate::app::errors::{ApiResult, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/comment/:id/", delete(delete_comment))
        .route("/comment/:id/likes/", post(like_comment))
        .route("/comment/:id/flags/", post(flag_comment))
}

pub async fn delete_comment(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let comment: CommentId = dto::parse_id(&id)?;
    services.delete_comment(caller.session(), comment)?;
    data(StatusCode::ACCEPTED, serde_json::json!({ "deleted": comment }))
}

pub async fn like_comment(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let comment: CommentId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.like_comment(caller.session(), comment, &body)?)
}

pub async fn flag_comment(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let comment: CommentId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.flag_comment(caller.session(), comment, &body)?)
}
