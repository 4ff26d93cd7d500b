use std::collections::HashMap;

use super::super::domain::{Answer, AnswerId, Feedback, QuestionId, QuestionKind};

/// Outcome of grading one answer at submit time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AutoGrade {
    pub is_correct: Option<bool>,
    pub score: Option<f64>,
}

pub(crate) fn auto_grade(kind: &QuestionKind, answer_text: &str, weight: f64) -> AutoGrade {
    match kind {
        QuestionKind::MultipleChoice { correct_answer, .. } => {
            let is_correct = answer_text == correct_answer;
            AutoGrade {
                is_correct: Some(is_correct),
                score: Some(if is_correct { weight } else { 0.0 }),
            }
        }
        QuestionKind::Subjective | QuestionKind::Coding { .. } => AutoGrade {
            is_correct: None,
            score: None,
        },
    }
}

/// Scores each answer ends up with once question feedback is folded in. The latest scored
/// feedback for a question wins; submission-level feedback is ignored.
pub(crate) fn effective_scores(answers: &[Answer], feedback: &[Feedback]) -> Vec<(AnswerId, Option<f64>)> {
    let mut by_question: HashMap<QuestionId, f64> = HashMap::new();
    for entry in feedback {
        if let (Some(question_id), Some(score)) = (entry.question_id, entry.score) {
            by_question.insert(question_id, score);
        }
    }

    answers
        .iter()
        .map(|answer| {
            let score = by_question
                .get(&answer.question_id)
                .copied()
                .or(answer.score);
            (answer.id, score)
        })
        .collect()
}

/// Arithmetic mean; `None` for an empty input.
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub(crate) fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
