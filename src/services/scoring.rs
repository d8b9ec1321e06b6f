use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::AnsweredQuestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ScoringResult {
    pub(crate) total_questions: u32,
    pub(crate) correct_answers: u32,
    /// Percentage, rounded down.
    pub(crate) score: u32,
}

/// A question counts as correct only when the selected options are exactly
/// the options flagged correct. No partial credit.
pub(crate) fn is_exact_match(answer: &AnsweredQuestion) -> bool {
    let correct: HashSet<Uuid> = answer
        .options
        .iter()
        .filter(|option| option.is_correct)
        .map(|option| option.id)
        .collect();
    let selected: HashSet<Uuid> = answer.selected_option_ids.iter().copied().collect();

    correct == selected
}

pub(crate) fn score(answers: &[AnsweredQuestion]) -> ScoringResult {
    let total_questions = answers.len() as u32;
    let correct_answers = answers.iter().filter(|answer| is_exact_match(answer)).count() as u32;

    let score = if total_questions == 0 {
        0
    } else {
        ((correct_answers as u64 * 100) / total_questions as u64) as u32
    };

    ScoringResult { total_questions, correct_answers, score }
}
