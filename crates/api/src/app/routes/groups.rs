use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{delete, get, post},
};

use kidsbook_auth::DenialKind;
use kidsbook_core::{GroupId, UserId};
use kidsbook_infra::Services;

use crate::app::dto::{self, AddedMembers, JsonObject};
use crate::app::errors::{ApiResult, NotAllowed, ServiceResultExt, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/group/", get(list_groups).post(create_group))
        .route("/group/:id/", get(group_detail).post(update_group))
        .route("/group/:id/delete/", delete(delete_group))
        .route("/group/:id/user/:uid/", post(add_member).delete(remove_member))
        .route("/group/:id/users/", get(list_members))
        .route("/group/:id/setting/", get(group_settings).post(update_group_settings))
}

pub async fn list_groups(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.list_groups(caller.session())?)
}

pub async fn create_group(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    data(StatusCode::ACCEPTED, services.create_group(caller.session(), &body)?)
}

pub async fn group_detail(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.group_detail(caller.session(), group)?)
}

/// Members who did not create the group get 405.
pub async fn update_group(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    let updated = services
        .update_group(caller.session(), group, &body)
        .or_not_allowed(NotAllowed::OnDenial(DenialKind::Ownership))?;
    data(StatusCode::ACCEPTED, updated)
}

pub async fn delete_group(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::ACCEPTED, services.delete_group(caller.session(), group)?)
}

pub async fn add_member(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, uid)): Path<(String, String)>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    let user: UserId = dto::parse_id(&uid)?;
    let added = services.add_member(caller.session(), group, user)?;
    data(StatusCode::ACCEPTED, AddedMembers { added })
}

pub async fn remove_member(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, uid)): Path<(String, String)>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    let user: UserId = dto::parse_id(&uid)?;
    services.remove_member(caller.session(), group, user)?;
    data(StatusCode::ACCEPTED, serde_json::json!({ "removed": user }))
}

pub async fn list_members(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.list_members(caller.session(), group)?)
}

pub async fn group_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.group_settings(caller.session(), group)?)
}

/// Non-teachers get 405; non-members 403.
pub async fn update_group_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    let settings = services
        .update_group_settings(caller.session(), group, &body)
        .or_not_allowed(NotAllowed::OnDenial(DenialKind::Role))?;
    data(StatusCode::ACCEPTED, settings)
}
