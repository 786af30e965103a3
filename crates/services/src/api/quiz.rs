use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quiz_core::model::{
    GradedOption, GradedQuestion, OptionId, OptionOrder, PriorSubmission, Question, QuestionId,
    Quiz, QuizId, QuizOption, QuizResult, QuizResultId, SelectedOptions, SessionKey,
    SubmissionRequest,
};

use crate::api::ApiContext;
use crate::error::ApiError;

const SUBMIT_PATH: &str = "courses/quiz/submit/";
const DEFAULT_TIME_LIMIT_SECS: u32 = 600;

fn quizzes_path(key: SessionKey) -> String {
    format!(
        "courses/enrollments/{}/modules/{}/quizzes/",
        key.course_id, key.module_id
    )
}

fn result_path(key: SessionKey, result_id: QuizResultId) -> String {
    format!(
        "courses/enrollments/{}/modules/{}/quiz-results/{result_id}/",
        key.course_id, key.module_id
    )
}

/// Remote operations needed by a quiz session.
#[async_trait]
pub trait QuizApi: Send + Sync {
    /// Fetch the quiz published for a module, including any prior submission.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NoQuiz` if the module has no quiz, or the request error.
    async fn fetch_module_quiz(&self, key: SessionKey) -> Result<Quiz, ApiError>;

    /// Submit answers. Callers guarantee at most one call per session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the submission is not accepted.
    async fn submit(&self, request: &SubmissionRequest) -> Result<QuizResultId, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the result cannot be fetched or decoded.
    async fn fetch_result(
        &self,
        key: SessionKey,
        result_id: QuizResultId,
    ) -> Result<QuizResult, ApiError>;
}

/// [`QuizApi`] over the LMS REST endpoints.
#[derive(Clone)]
pub struct HttpQuizApi {
    ctx: ApiContext,
}

impl HttpQuizApi {
    #[must_use]
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_module_quiz(&self, key: SessionKey) -> Result<Quiz, ApiError> {
        let body: ModuleQuizzesDto = self.ctx.get_json(&quizzes_path(key)).await?;
        let quiz = quiz_from_dto(body)?;
        tracing::info!(
            %key,
            quiz_id = %quiz.id(),
            questions = quiz.questions().len(),
            submitted = quiz.prior_submission().is_some(),
            "fetched module quiz"
        );
        Ok(quiz)
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<QuizResultId, ApiError> {
        let body = SubmitBody {
            quiz_id: request.quiz_id,
            selected_options: wire_selections(&request.selected_options),
        };
        let response: SubmitResponse = self.ctx.post_json(SUBMIT_PATH, &body).await?;
        tracing::info!(
            quiz_id = %request.quiz_id,
            result_id = %response.quiz_result_id,
            trigger = ?request.trigger,
            "quiz submitted"
        );
        Ok(response.quiz_result_id)
    }

    async fn fetch_result(
        &self,
        key: SessionKey,
        result_id: QuizResultId,
    ) -> Result<QuizResult, ApiError> {
        let body: QuizResultEnvelope = self.ctx.get_json(&result_path(key, result_id)).await?;
        result_from_dto(body.quiz_result)
    }
}

//
// ─── WIRE FORMAT ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct ModuleQuizzesDto {
    #[serde(default)]
    quizzes: Vec<QuizDto>,
}

#[derive(Debug, Deserialize)]
struct QuizDto {
    id: QuizId,
    #[serde(default)]
    title: String,
    #[serde(default = "default_time_limit")]
    time_limit: u32,
    #[serde(default)]
    questions: Vec<QuestionDto>,
    #[serde(default)]
    submitted: bool,
    #[serde(default)]
    quiz_result_id: Option<QuizResultId>,
    #[serde(default)]
    result: Option<PriorResultDto>,
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECS
}

#[derive(Debug, Deserialize)]
struct PriorResultDto {
    #[serde(default)]
    submitted: bool,
    #[serde(default)]
    quiz_result_id: Option<QuizResultId>,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: QuestionId,
    #[serde(default)]
    question_text: String,
    #[serde(default)]
    options: Vec<OptionDto>,
}

#[derive(Debug, Deserialize)]
struct OptionDto {
    id: OptionId,
    #[serde(default)]
    option_text: String,
    order: OptionOrder,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    quiz_id: QuizId,
    selected_options: BTreeMap<String, Option<OptionOrder>>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    quiz_result_id: QuizResultId,
}

#[derive(Debug, Deserialize)]
struct QuizResultEnvelope {
    quiz_result: QuizResultDto,
}

#[derive(Debug, Deserialize)]
struct QuizResultDto {
    #[serde(default)]
    obtained_marks: u32,
    #[serde(default)]
    total_marks: u32,
    #[serde(default)]
    selected_options: BTreeMap<String, Option<OptionOrder>>,
    #[serde(default)]
    quiz: ResultQuizDto,
}

#[derive(Debug, Default, Deserialize)]
struct ResultQuizDto {
    #[serde(default)]
    title: String,
    #[serde(default)]
    questions: Vec<GradedQuestionDto>,
}

#[derive(Debug, Deserialize)]
struct GradedQuestionDto {
    id: QuestionId,
    #[serde(default)]
    question_text: String,
    #[serde(default)]
    options: Vec<GradedOptionDto>,
}

#[derive(Debug, Deserialize)]
struct GradedOptionDto {
    id: OptionId,
    #[serde(default)]
    option_text: String,
    order: OptionOrder,
    #[serde(default)]
    is_correct: bool,
}

/// The nested `result` block wins over the top-level flags when both are present.
fn prior_submission(dto: &QuizDto) -> Result<Option<PriorSubmission>, ApiError> {
    let (submitted, result_id) = match &dto.result {
        Some(result) if result.submitted => (true, result.quiz_result_id.or(dto.quiz_result_id)),
        _ => (dto.submitted, dto.quiz_result_id),
    };
    if !submitted {
        return Ok(None);
    }
    result_id
        .map(|result_id| Some(PriorSubmission { result_id }))
        .ok_or_else(|| ApiError::Malformed("quiz marked submitted without a result id".into()))
}

fn quiz_from_dto(body: ModuleQuizzesDto) -> Result<Quiz, ApiError> {
    let dto = body.quizzes.into_iter().next().ok_or(ApiError::NoQuiz)?;
    let prior = prior_submission(&dto)?;
    let questions = dto
        .questions
        .into_iter()
        .map(|question| Question {
            id: question.id,
            text: question.question_text,
            options: question
                .options
                .into_iter()
                .map(|option| QuizOption {
                    id: option.id,
                    text: option.option_text,
                    order: option.order,
                })
                .collect(),
        })
        .collect();

    Ok(Quiz::new(dto.id, dto.title, dto.time_limit, questions, prior)?)
}

fn wire_selections(selected: &SelectedOptions) -> BTreeMap<String, Option<OptionOrder>> {
    selected
        .iter()
        .map(|(question, order)| (question.to_string(), *order))
        .collect()
}

fn result_from_dto(dto: QuizResultDto) -> Result<QuizResult, ApiError> {
    let mut selections = BTreeMap::new();
    for (raw, order) in dto.selected_options {
        let question: QuestionId = raw
            .parse()
            .map_err(|_| ApiError::Malformed(format!("invalid question id {raw:?}")))?;
        if let Some(order) = order {
            selections.insert(question, order);
        }
    }

    let questions = dto
        .quiz
        .questions
        .into_iter()
        .map(|question| GradedQuestion {
            id: question.id,
            text: question.question_text,
            options: question
                .options
                .into_iter()
                .map(|option| GradedOption {
                    id: option.id,
                    text: option.option_text,
                    order: option.order,
                    is_correct: option.is_correct,
                })
                .collect(),
        })
        .collect();

    Ok(QuizResult {
        title: dto.quiz.title,
        obtained_marks: dto.obtained_marks,
        total_marks: dto.total_marks,
        selections,
        questions,
    })
}
