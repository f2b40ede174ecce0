use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};

use kidsbook_core::{GroupId, SurveyId};
use kidsbook_infra::{Services, SurveyFilter};

use crate::app::dto::{self, JsonObject};
use crate::app::errors::{ApiResult, data};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/group/:id/surveys/", get(list_surveys).post(create_survey))
        .route("/survey/:id/answer/", post(answer_survey))
}

/// `?is_pinned=` and `?is_completed=` accept the usual string booleans.
pub async fn list_surveys(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    let filter = SurveyFilter::from_query(&params)?;
    data(StatusCode::OK, services.list_surveys(caller.session(), group, filter)?)
}

pub async fn create_survey(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let group: GroupId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.create_survey(caller.session(), group, &body)?)
}

pub async fn answer_survey(
    Extension(services): Extension<Arc<Services>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> ApiResult {
    let survey: SurveyId = dto::parse_id(&id)?;
    data(StatusCode::CREATED, services.answer_survey(caller.session(), survey, &body)?)
}
