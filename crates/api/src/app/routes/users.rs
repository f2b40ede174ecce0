use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};

use kidsbook_auth::DenialKind;
use kidsbook_core::UserId;
use kidsbook_infra::Services;

use crate::app::dto::{self, JsonObject};
use crate::app::errors::{ApiResult, NotAllowed, ServiceResultExt, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/user/register/", post(register_user))
        .route("/user/setting/", get(user_settings).post(update_user_settings))
        .route("/user/virtual_users/", get(virtual_users))
        .route("/user/login_as_virtual/", post(login_as_virtual))
        .route("/user/logout/", post(logout))
        .route("/user/posts/", get(my_posts))
        .route("/user/update/:id/", post(update_user))
        .route("/user/:id/", get(view_user))
        .route("/user/:id/groups/", get(user_groups))
}

pub async fn my_posts(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.my_posts(caller.session())?)
}

/// Rejected registrations answer 405.
pub async fn register_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let profile = services
        .register_user(caller.session(), &body)
        .or_not_allowed(NotAllowed::OnInvalidInput)?;
    data(StatusCode::ACCEPTED, profile)
}

pub async fn view_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let user: UserId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.view_user(caller.session(), user)?)
}

/// Ownership denials and rejected input (including username or email
/// collisions) answer 405.
pub async fn update_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let user: UserId = dto::parse_id(&id)?;
    let profile = services
        .update_user(caller.session(), user, &body)
        .or_not_allowed(NotAllowed::OnDenialOrInvalidInput(DenialKind::Ownership))?;
    data(StatusCode::ACCEPTED, profile)
}

pub async fn user_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.user_settings(caller.session())?)
}

pub async fn update_user_settings(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    data(StatusCode::ACCEPTED, services.update_user_settings(caller.session(), &body)?)
}

pub async fn virtual_users(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.virtual_users(caller.session())?)
}

pub async fn login_as_virtual(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let login = services
        .login_as_virtual(caller.session(), &body)
        .or_not_allowed(NotAllowed::OnDenial(DenialKind::Ownership))?;
    data(StatusCode::OK, login)
}

pub async fn user_groups(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let user: UserId = dto::parse_id(&id)?;
    data(StatusCode::OK, services.user_groups(caller.session(), user)?)
}

pub async fn logout(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    services.logout(caller.session())?;
    data(StatusCode::ACCEPTED, serde_json::json!({ "logged_out": true }))
}
