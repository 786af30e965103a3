use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{OptionId, OptionOrder, QuestionId, QuizId, QuizResultId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("question {question} has no options")]
    NoOptions { question: QuestionId },

    #[error("question {question} repeats option order {order}")]
    DuplicateOptionOrder {
        question: QuestionId,
        order: OptionOrder,
    },
}

//
// ─── QUESTIONS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub id: OptionId,
    pub text: String,
    pub order: OptionOrder,
}

/// A multiple-choice question with its options in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    #[must_use]
    pub fn has_option(&self, order: OptionOrder) -> bool {
        self.options.iter().any(|option| option.order == order)
    }
}

/// Marker for a quiz the student already submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorSubmission {
    pub result_id: QuizResultId,
}

//
// ─── QUIZ ─────────────────────────────────────────────────────────────────────
//

/// Quiz data as loaded for one module. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    time_limit_secs: u32,
    questions: Vec<Question>,
    prior: Option<PriorSubmission>,
}

impl Quiz {
    /// Build a quiz from server data.
    ///
    /// An already-submitted quiz skips question validation: nothing will be answered.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the time limit is zero, there are no questions, or
    /// question ids / option orders are not unique.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        time_limit_secs: u32,
        questions: Vec<Question>,
        prior: Option<PriorSubmission>,
    ) -> Result<Self, QuizError> {
        if prior.is_none() {
            validate_questions(time_limit_secs, &questions)?;
        }

        Ok(Self {
            id,
            title: title.into(),
            time_limit_secs,
            questions,
            prior,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn prior_submission(&self) -> Option<PriorSubmission> {
        self.prior
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|question| question.id == id)
    }

    #[must_use]
    pub fn has_option(&self, question: QuestionId, order: OptionOrder) -> bool {
        self.question(question)
            .is_some_and(|question| question.has_option(order))
    }
}

fn validate_questions(time_limit_secs: u32, questions: &[Question]) -> Result<(), QuizError> {
    if time_limit_secs == 0 {
        return Err(QuizError::ZeroTimeLimit);
    }
    if questions.is_empty() {
        return Err(QuizError::NoQuestions);
    }

    let mut seen = HashSet::with_capacity(questions.len());
    for question in questions {
        if !seen.insert(question.id) {
            return Err(QuizError::DuplicateQuestion(question.id));
        }
        if question.options.is_empty() {
            return Err(QuizError::NoOptions {
                question: question.id,
            });
        }
        let mut orders = HashSet::with_capacity(question.options.len());
        for option in &question.options {
            if !orders.insert(option.order) {
                return Err(QuizError::DuplicateOptionOrder {
                    question: question.id,
                    order: option.order,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Builds a quiz whose questions are numbered from 1, each with `options` options.
    pub(crate) fn quiz(time_limit_secs: u32, questions: u64, options: u32) -> Quiz {
        let questions = (1..=questions)
            .map(|q| Question {
                id: QuestionId::new(q),
                text: format!("Question {q}"),
                options: (1..=options)
                    .map(|o| QuizOption {
                        id: OptionId::new(q * 10 + u64::from(o)),
                        text: format!("Option {o}"),
                        order: OptionOrder::new(o),
                    })
                    .collect(),
            })
            .collect();
        Quiz::new(QuizId::new(1), "Module quiz", time_limit_secs, questions, None).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, orders: &[u32]) -> Question {
        Question {
            id: QuestionId::new(id),
            text: format!("Q{id}"),
            options: orders
                .iter()
                .map(|order| QuizOption {
                    id: OptionId::new(id * 100 + u64::from(*order)),
                    text: format!("O{order}"),
                    order: OptionOrder::new(*order),
                })
                .collect(),
        }
    }

    #[test]
    fn rejects_zero_time_limit() {
        let err = Quiz::new(QuizId::new(1), "Q", 0, vec![question(1, &[1, 2])], None).unwrap_err();
        assert_eq!(err, QuizError::ZeroTimeLimit);
    }

    #[test]
    fn rejects_empty_question_list() {
        let err = Quiz::new(QuizId::new(1), "Q", 60, Vec::new(), None).unwrap_err();
        assert_eq!(err, QuizError::NoQuestions);
    }

    #[test]
    fn rejects_duplicate_option_order() {
        let err = Quiz::new(QuizId::new(1), "Q", 60, vec![question(4, &[1, 1])], None).unwrap_err();
        assert_eq!(
            err,
            QuizError::DuplicateOptionOrder {
                question: QuestionId::new(4),
                order: OptionOrder::new(1),
            }
        );
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let err = Quiz::new(
            QuizId::new(1),
            "Q",
            60,
            vec![question(2, &[1]), question(2, &[1])],
            None,
        )
        .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(2)));
    }

    #[test]
    fn prior_submission_skips_question_checks() {
        let prior = PriorSubmission {
            result_id: QuizResultId::new(9),
        };
        let quiz = Quiz::new(QuizId::new(1), "Done", 0, Vec::new(), Some(prior)).unwrap();
        assert_eq!(quiz.prior_submission(), Some(prior));
    }

    #[test]
    fn looks_up_options_by_order() {
        let quiz = fixtures::quiz(600, 2, 3);
        assert!(quiz.has_option(QuestionId::new(2), OptionOrder::new(3)));
        assert!(!quiz.has_option(QuestionId::new(2), OptionOrder::new(4)));
        assert!(!quiz.has_option(QuestionId::new(9), OptionOrder::new(1)));
    }
}
