use std::sync::Arc;

use quiz_core::model::{QuizResult, QuizResultId, SessionKey};

use crate::api::QuizApi;
use crate::error::ApiError;

/// Loads graded results for display after a submission.
#[derive(Clone)]
pub struct ResultService {
    api: Arc<dyn QuizApi>,
}

impl ResultService {
    #[must_use]
    pub fn new(api: Arc<dyn QuizApi>) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Returns `ApiError` if the result cannot be fetched.
    pub async fn load(
        &self,
        key: SessionKey,
        result_id: QuizResultId,
    ) -> Result<QuizResult, ApiError> {
        let result = self.api.fetch_result(key, result_id).await?;
        tracing::debug!(
            %key,
            %result_id,
            obtained = result.obtained_marks,
            total = result.total_marks,
            "loaded quiz result"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{CourseId, ModuleId, Quiz, SubmissionRequest};
    use std::collections::BTreeMap;

    struct Graded;

    #[async_trait]
    impl QuizApi for Graded {
        async fn fetch_module_quiz(&self, _key: SessionKey) -> Result<Quiz, ApiError> {
            Err(ApiError::NoQuiz)
        }

        async fn submit(&self, _request: &SubmissionRequest) -> Result<QuizResultId, ApiError> {
            Err(ApiError::NoQuiz)
        }

        async fn fetch_result(
            &self,
            _key: SessionKey,
            result_id: QuizResultId,
        ) -> Result<QuizResult, ApiError> {
            Ok(QuizResult {
                title: format!("Result {result_id}"),
                obtained_marks: 3,
                total_marks: 4,
                selections: BTreeMap::new(),
                questions: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn loads_result_by_id() {
        let service = ResultService::new(Arc::new(Graded));
        let key = SessionKey::new(CourseId::new(1), ModuleId::new(2));
        let result = service.load(key, QuizResultId::new(8)).await.unwrap();
        assert_eq!(result.title, "Result 8");
        assert_eq!(result.summary().score_percent, 75);
    }
}
