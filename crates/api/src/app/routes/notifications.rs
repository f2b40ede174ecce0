use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
};

use kidsbook_infra::Services;

use crate::app::errors::{ApiResult, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/notification/", get(list_notifications))
        .route("/notification/unseen/", get(unseen_count))
        .route("/notification/unseen/reset/", post(reset_unseen))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.list_notifications(caller.session())?)
}

pub async fn unseen_count(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::OK, services.unseen_count(caller.session())?)
}

pub async fn reset_unseen(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
) -> ApiResult {
    data(StatusCode::ACCEPTED, services.reset_unseen(caller.session())?)
}
