use std::collections::BTreeMap;

use crate::model::ids::{OptionId, OptionOrder, QuestionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedOption {
    pub id: OptionId,
    pub text: String,
    pub order: OptionOrder,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedQuestion {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<GradedOption>,
}

impl GradedQuestion {
    #[must_use]
    pub fn correct_order(&self) -> Option<OptionOrder> {
        self.options
            .iter()
            .find(|option| option.is_correct)
            .map(|option| option.order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    Skipped,
}

/// Highlight for an option in the answer review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    SelectedCorrect,
    SelectedWrong,
    /// Not chosen, but the right answer.
    Correct,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSummary {
    pub total_questions: usize,
    pub correct: usize,
    pub wrong: usize,
    pub skipped: usize,
    pub score_percent: u32,
}

/// A graded submission as returned by the result endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub title: String,
    pub obtained_marks: u32,
    pub total_marks: u32,
    pub selections: BTreeMap<QuestionId, OptionOrder>,
    pub questions: Vec<GradedQuestion>,
}

impl QuizResult {
    #[must_use]
    pub fn outcome(&self, question: &GradedQuestion) -> AnswerOutcome {
        match self.selections.get(&question.id) {
            None => AnswerOutcome::Skipped,
            Some(order) if question.correct_order() == Some(*order) => AnswerOutcome::Correct,
            Some(_) => AnswerOutcome::Incorrect,
        }
    }

    #[must_use]
    pub fn mark(&self, question: &GradedQuestion, option: &GradedOption) -> OptionMark {
        let selected = self.selections.get(&question.id) == Some(&option.order);
        match (selected, option.is_correct) {
            (true, true) => OptionMark::SelectedCorrect,
            (true, false) => OptionMark::SelectedWrong,
            (false, true) => OptionMark::Correct,
            (false, false) => OptionMark::Neutral,
        }
    }

    #[must_use]
    pub fn summary(&self) -> ResultSummary {
        let mut correct = 0;
        let mut wrong = 0;
        let mut skipped = 0;
        for question in &self.questions {
            match self.outcome(question) {
                AnswerOutcome::Correct => correct += 1,
                AnswerOutcome::Incorrect => wrong += 1,
                AnswerOutcome::Skipped => skipped += 1,
            }
        }

        let score_percent = if self.total_marks == 0 {
            0
        } else {
            let scaled = u64::from(self.obtained_marks.min(self.total_marks)) * 100
                / u64::from(self.total_marks);
            u32::try_from(scaled).unwrap_or(100)
        };

        ResultSummary {
            total_questions: self.questions.len(),
            correct,
            wrong,
            skipped,
            score_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(id: u64, correct: u32) -> GradedQuestion {
        GradedQuestion {
            id: QuestionId::new(id),
            text: format!("Q{id}"),
            options: (1..=4)
                .map(|order| GradedOption {
                    id: OptionId::new(id * 10 + u64::from(order)),
                    text: format!("O{order}"),
                    order: OptionOrder::new(order),
                    is_correct: order == correct,
                })
                .collect(),
        }
    }

    fn result() -> QuizResult {
        let mut selections = BTreeMap::new();
        selections.insert(QuestionId::new(1), OptionOrder::new(2));
        selections.insert(QuestionId::new(2), OptionOrder::new(1));
        QuizResult {
            title: "Module 1 quiz".into(),
            obtained_marks: 1,
            total_marks: 3,
            selections,
            questions: vec![graded(1, 2), graded(2, 3), graded(3, 4)],
        }
    }

    #[test]
    fn classifies_each_question() {
        let result = result();
        let outcomes: Vec<_> = result.questions.iter().map(|q| result.outcome(q)).collect();
        assert_eq!(
            outcomes,
            vec![
                AnswerOutcome::Correct,
                AnswerOutcome::Incorrect,
                AnswerOutcome::Skipped
            ]
        );
    }

    #[test]
    fn marks_selected_and_correct_options() {
        let result = result();
        let q2 = &result.questions[1];
        let marks: Vec<_> = q2.options.iter().map(|o| result.mark(q2, o)).collect();
        assert_eq!(
            marks,
            vec![
                OptionMark::SelectedWrong,
                OptionMark::Neutral,
                OptionMark::Correct,
                OptionMark::Neutral
            ]
        );
    }

    #[test]
    fn summary_counts_and_scores() {
        let summary = result().summary();
        assert_eq!(summary.total_questions, 3);
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.wrong, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.score_percent, 33);
    }

    #[test]
    fn zero_total_marks_scores_zero() {
        let mut result = result();
        result.total_marks = 0;
        assert_eq!(result.summary().score_percent, 0);
    }
}
