mod ids;
mod quiz;
mod result;
mod selection;
mod session;

pub use ids::{
    CourseId, ModuleId, OptionId, OptionOrder, ParseIdError, QuestionId, QuizId, QuizResultId,
    SessionKey,
};
pub use quiz::{PriorSubmission, Question, Quiz, QuizError, QuizOption};
pub use result::{AnswerOutcome, GradedOption, GradedQuestion, OptionMark, QuizResult, ResultSummary};
pub use selection::{SelectedOptions, SelectionTracker};
pub use session::{
    FailurePhase, LoadOutcome, QuizSession, SessionError, SessionFailure, SessionProgress,
    SessionState, SessionStatus, SubmissionRequest, SubmitTrigger, SubmittedVia, TickOutcome,
};
