use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use kidsbook_core::{GroupId, PostId};
use kidsbook_infra::Services;

use crate::app::dto::{self, JsonObject};
use crate::app::errors::{ApiResult, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/group/:id/posts/", get(list_posts).post(create_post))
        .route("/post/:id/", get(view_post).delete(delete_post))
        .route("/post/:id/likes/", post(like_post))
        .route("/post/:id/shares/", post(share_post))
        .route("/post/:id/flags/", post(flag_post))
        .route("/post/:id/comments/", get(list_comments).post(comment_on_post))
}

pub async fn list_posts(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.list_posts(caller.session(), group)?)
}

pub async fn create_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.create_post(caller.session(), group, &body)?)
}

pub async fn view_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.view_post(caller.session(), post)?)
}

pub async fn delete_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    services.delete_post(caller.session(), post)?;
    data(StatusCode::ACCEPTED, serde_json::json!({ "deleted": post }))
}

pub async fn like_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.like_post(caller.session(), post, &body)?)
}

pub async fn share_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.share_post(caller.session(), post)?)
}

pub async fn flag_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.flag_post(caller.session(), post, &body)?)
}

pub async fn list_comments(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.list_comments(caller.session(), post)?)
}

pub async fn comment_on_post(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let post: PostId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.comment_on_post(caller.session(), post, &body)?)
}
