use std::collections::BTreeMap;

use crate::model::ids::{OptionOrder, QuestionId};
use crate::model::quiz::Question;

/// Submission map of every question to its chosen option, `None` for skipped.
pub type SelectedOptions = BTreeMap<QuestionId, Option<OptionOrder>>;

/// Tracks the single chosen option per question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    chosen: BTreeMap<QuestionId, OptionOrder>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose `order` for `question`; choosing the current option again deselects it.
    pub fn select(&mut self, question: QuestionId, order: OptionOrder) {
        if self.chosen.get(&question) == Some(&order) {
            self.chosen.remove(&question);
        } else {
            self.chosen.insert(question, order);
        }
    }

    #[must_use]
    pub fn selected(&self, question: QuestionId) -> Option<OptionOrder> {
        self.chosen.get(&question).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.chosen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    /// Drain the tracker into a payload that lists every question of the quiz.
    ///
    /// Selections for questions not in `questions` are dropped.
    #[must_use]
    pub fn into_payload(mut self, questions: &[Question]) -> SelectedOptions {
        questions
            .iter()
            .map(|question| (question.id, self.chosen.remove(&question.id)))
            .collect()
    }
}
