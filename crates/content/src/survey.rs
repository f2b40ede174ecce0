use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kidsbook_auth::Role;
use kidsbook_core::{DomainError, DomainResult, Entity, GroupId, SurveyId, UserId};

/// One question of a survey. Questions without options take free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Front-end widget hint; not interpreted here.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

impl Question {
    fn option_count(&self) -> usize {
        self.options.as_ref().map_or(0, Vec::len)
    }
}

/// Aggregate answer counts. `answers["<question index>"][option index]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyStats {
    pub num_of_responses: u32,
    pub answers: BTreeMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub group: GroupId,
    pub creator: UserId,
    pub title: String,
    pub preface: String,
    pub postface: String,
    pub is_pinned: bool,
    pub questions_answers: Vec<Question>,
    pub stats: SurveyStats,
    pub created_at: DateTime<Utc>,
}

impl Entity for Survey {
    type Id = SurveyId;

    fn id(&self) -> SurveyId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSurvey {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub preface: String,
    #[serde(default)]
    pub postface: String,
    #[serde(default)]
    pub is_pinned: bool,
    pub questions_answers: Vec<Question>,
}

/// A user's submitted answers, one per question. Unique per (user, survey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswer {
    pub user: UserId,
    pub survey: SurveyId,
    pub answers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    pub fn create(
        cmd: CreateSurvey,
        group: GroupId,
        creator: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if cmd.questions_answers.is_empty() {
            return Err(DomainError::validation("a survey needs at least one question"));
        }
        for (i, q) in cmd.questions_answers.iter().enumerate() {
            if q.question.trim().is_empty() {
                return Err(DomainError::validation(format!("question {i} has no text")));
            }
            if matches!(&q.options, Some(opts) if opts.is_empty()) {
                return Err(DomainError::validation(format!("question {i} has an empty option list")));
            }
        }

        let answers = cmd
            .questions_answers
            .iter()
            .enumerate()
            .map(|(i, q)| (i.to_string(), vec![0; q.option_count()]))
            .collect();

        Ok(Self {
            id: SurveyId::new(),
            group,
            creator,
            title: cmd.title,
            preface: cmd.preface,
            postface: cmd.postface,
            is_pinned: cmd.is_pinned,
            questions_answers: cmd.questions_answers,
            stats: SurveyStats {
                num_of_responses: 0,
                answers,
            },
            created_at: occurred_at,
        })
    }

    /// Validate `answers` and fold them into the stats.
    ///
    /// Option questions accept the option text or its index; an empty string
    /// skips a non-required question.
    pub fn record_answer(&mut self, answers: &[String]) -> DomainResult<()> {
        if answers.len() != self.questions_answers.len() {
            return Err(DomainError::validation(format!(
                "expected {} answers, got {}",
                self.questions_answers.len(),
                answers.len()
            )));
        }

        let mut picks: Vec<(usize, usize)> = Vec::new();
        for (i, (q, a)) in self.questions_answers.iter().zip(answers).enumerate() {
            let a = a.trim();
            if a.is_empty() {
                if q.required {
                    return Err(DomainError::validation(format!("question {i} is required")));
                }
                continue;
            }
            if let Some(opts) = &q.options {
                let idx = opts
                    .iter()
                    .position(|o| o == a)
                    .or_else(|| a.parse::<usize>().ok().filter(|n| *n < opts.len()))
                    .ok_or_else(|| DomainError::validation(format!("'{a}' is not an option of question {i}")))?;
                picks.push((i, idx));
            }
        }

        for (q, opt) in picks {
            if let Some(counts) = self.stats.answers.get_mut(&q.to_string()) {
                if let Some(c) = counts.get_mut(opt) {
                    *c += 1;
                }
            }
        }
        self.stats.num_of_responses += 1;
        Ok(())
    }
}

/// Survey as listed; stats only for teachers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyView {
    pub id: SurveyId,
    pub creator: UserId,
    pub group: GroupId,
    pub title: String,
    pub preface: String,
    pub postface: String,
    pub is_pinned: bool,
    pub questions_answers: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SurveyStats>,
}

impl SurveyView {
    pub fn project(survey: &Survey, viewer: Role) -> Self {
        Self {
            id: survey.id,
            creator: survey.creator,
            group: survey.group,
            title: survey.title.clone(),
            preface: survey.preface.clone(),
            postface: survey.postface.clone(),
            is_pinned: survey.is_pinned,
            questions_answers: survey.questions_answers.clone(),
            stats: viewer.sees_stats().then(|| survey.stats.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(text: &str, options: Option<&[&str]>, required: bool) -> Question {
        Question {
            question: text.into(),
            options: options.map(|o| o.iter().map(|s| s.to_string()).collect()),
            kind: "radio".into(),
            required,
        }
    }

    fn survey() -> Survey {
        Survey::create(
            CreateSurvey {
                title: "Mood".into(),
                preface: String::new(),
                postface: String::new(),
                is_pinned: false,
                questions_answers: vec![
                    q("How are you?", Some(&["good", "bad"][..]), true),
                    q("Why?", None, false),
                ],
            },
            GroupId::new(),
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn stats_start_at_zero_per_option() {
        let s = survey();
        assert_eq!(s.stats.answers["0"], vec![0, 0]);
        assert!(s.stats.answers["1"].is_empty());
    }

    #[test]
    fn answers_update_counts_by_text_or_index() {
        let mut s = survey();
        s.record_answer(&["bad".into(), "tired".into()]).unwrap();
        s.record_answer(&["0".into(), String::new()]).unwrap();
        assert_eq!(s.stats.answers["0"], vec![1, 1]);
        assert_eq!(s.stats.num_of_responses, 2);
    }

    #[test]
    fn required_questions_are_enforced() {
        let mut s = survey();
        let err = s.record_answer(&[String::new(), "x".into()]).unwrap_err();
        assert!(err.to_string().contains("required"));
        assert_eq!(s.stats.num_of_responses, 0);
    }

    #[test]
    fn unknown_option_is_rejected_without_partial_update() {
        let mut s = survey();
        assert!(s.record_answer(&["meh".into(), String::new()]).is_err());
        assert_eq!(s.stats.answers["0"], vec![0, 0]);
    }

    #[test]
    fn stats_are_teacher_only() {
        let s = survey();
        assert!(SurveyView::project(&s, Role::Teacher).stats.is_some());
        assert!(SurveyView::project(&s, Role::Student).stats.is_none());
    }
}
