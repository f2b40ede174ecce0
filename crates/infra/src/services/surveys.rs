use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};

use kidsbook_auth::{Action, ResourceRef, Session, authorize};
use kidsbook_content::{CreateSurvey, Survey, SurveyAnswer, SurveyView};
use kidsbook_core::coerce::coerce_bool;
use kidsbook_core::{DomainError, DomainResult, GroupId, SurveyId};

use super::{ServiceResult, Services};

/// Query filters of the survey listing. Values arrive as strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveyFilter {
    pub is_pinned: Option<bool>,
    /// Whether the caller has already answered.
    pub is_completed: Option<bool>,
}

impl SurveyFilter {
    pub fn from_query(params: &HashMap<String, String>) -> DomainResult<Self> {
        let flag = |name: &str| -> DomainResult<Option<bool>> {
            params
                .get(name)
                .map(|v| coerce_bool(name, &Value::String(v.clone())))
                .transpose()
        };
        Ok(Self {
            is_pinned: flag("is_pinned")?,
            is_completed: flag("is_completed")?,
        })
    }
}

impl Services {
    pub fn list_surveys(
        &self,
        session: Option<&Session>,
        group: GroupId,
        filter: SurveyFilter,
    ) -> ServiceResult<Vec<SurveyView>> {
        self.query(|t| {
            let caller = authorize(session, Action::ListSurveys, &ResourceRef::Group(group), t)?;
            Ok(t.surveys_in(group)
                .into_iter()
                .filter(|s| filter.is_pinned.is_none_or(|p| s.is_pinned == p))
                .filter(|s| {
                    filter
                        .is_completed
                        .is_none_or(|c| t.has_answered_survey(caller.user_id, s.id) == c)
                })
                .map(|s| SurveyView::project(s, caller.role))
                .collect())
        })
    }

    pub fn create_survey(
        &self,
        session: Option<&Session>,
        group: GroupId,
        body: &Map<String, Value>,
    ) -> ServiceResult<SurveyView> {
        self.command(|t| {
            let caller = authorize(session, Action::CreateSurvey, &ResourceRef::Group(group), &*t)?;
            let cmd: CreateSurvey = serde_json::from_value(Value::Object(body.clone()))
                .map_err(|e| DomainError::validation(e.to_string()))?;
            let survey = Survey::create(cmd, group, caller.user_id, Utc::now())?;
            let view = SurveyView::project(&survey, caller.role);
            tracing::info!(survey_id = %survey.id, group_id = %group, "survey created");
            t.insert_survey(survey);
            Ok(view)
        })
    }

    /// One answer per user; stats are updated in the same transaction.
    pub fn answer_survey(
        &self,
        session: Option<&Session>,
        survey: SurveyId,
        body: &Map<String, Value>,
    ) -> ServiceResult<SurveyAnswer> {
        self.command(|t| {
            let caller = authorize(session, Action::AnswerSurvey, &ResourceRef::Survey(survey), &*t)?;
            if t.has_answered_survey(caller.user_id, survey) {
                return Err(DomainError::conflict("You have already answered this survey.").into());
            }
            let answers: Vec<String> = body
                .get("answers")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| DomainError::validation(format!("answers: {e}")))?
                .ok_or_else(|| DomainError::validation("answers is required"))?;

            t.survey_mut(survey)?.record_answer(&answers)?;
            let answer = SurveyAnswer {
                user: caller.user_id,
                survey,
                answers,
                created_at: Utc::now(),
            };
            t.insert_survey_answer(answer.clone())?;
            Ok(answer)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_accept_string_booleans() {
        let params: HashMap<String, String> =
            [("is_pinned".to_string(), "True".to_string()), ("is_completed".to_string(), "no".to_string())].into();
        let f = SurveyFilter::from_query(&params).unwrap();
        assert_eq!(f.is_pinned, Some(true));
        assert_eq!(f.is_completed, Some(false));
        assert_eq!(SurveyFilter::from_query(&HashMap::new()).unwrap(), SurveyFilter::default());
    }
}
