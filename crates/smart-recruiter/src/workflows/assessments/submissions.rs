use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::clock::Clock;
use super::domain::{
    Answer, AnswerDraft, AssessmentId, InvitationStatus, NewAnswer, NewSubmission, Question,
    QuestionId, Submission, SubmissionStatus, UserId,
};
use super::error::WorkflowError;
use super::invitations::observe_expiry;
use super::repository::{InvitationFilter, RecordStore, RepositoryError, SubmissionFilter};
use super::scoring::{rules, ScoringConfig};

/// Submission record together with its persisted answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub answers: Vec<Answer>,
}

/// Validates answer payloads and opens submissions against accepted invitations.
pub struct SubmissionIntake<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    scoring: ScoringConfig,
}

impl<S> SubmissionIntake<S>
where
    S: RecordStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, scoring: ScoringConfig) -> Self {
        Self {
            store,
            clock,
            scoring,
        }
    }

    /// Record an interviewee's answers as a `submitted` submission. Multiple choice answers
    /// are graded on the spot; the submission and every answer are written in one unit.
    pub fn submit(
        &self,
        assessment_id: AssessmentId,
        interviewee_id: UserId,
        answers: Vec<AnswerDraft>,
    ) -> Result<SubmissionReceipt, WorkflowError> {
        let entries = validate_entries(answers)?;

        self.store
            .fetch_assessment(assessment_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("assessment {assessment_id}")))?;

        let already_submitted = !self
            .store
            .find_submissions(SubmissionFilter::pair(assessment_id, interviewee_id))?
            .is_empty();
        if already_submitted {
            return Err(duplicate_submission(assessment_id, interviewee_id));
        }

        self.require_accepted_invitation(assessment_id, interviewee_id)?;

        let questions: HashMap<QuestionId, Question> = self
            .store
            .questions_for(assessment_id)?
            .into_iter()
            .map(|question| (question.id, question))
            .collect();

        let mut graded = Vec::with_capacity(entries.len());
        for (question_id, answer_text) in entries {
            let question = questions.get(&question_id).ok_or_else(|| {
                WorkflowError::validation(format!(
                    "question {question_id} does not belong to assessment {assessment_id}"
                ))
            })?;
            let grade =
                rules::auto_grade(&question.kind, &answer_text, self.scoring.weight_for(question));
            graded.push(NewAnswer {
                question_id,
                answer_text,
                is_correct: grade.is_correct,
                score: grade.score,
            });
        }

        let (submission, answers) = self
            .store
            .insert_submission(NewSubmission {
                assessment_id,
                interviewee_id,
                status: SubmissionStatus::Submitted,
                score: None,
                submitted_at: Some(self.clock.now()),
                answers: graded,
            })
            .map_err(|error| match error {
                RepositoryError::Conflict(_) => duplicate_submission(assessment_id, interviewee_id),
                other => other.into(),
            })?;

        let auto_graded = answers
            .iter()
            .filter(|answer| answer.is_correct.is_some())
            .count();
        info!(
            submission = %submission.id,
            assessment = %assessment_id,
            interviewee = %interviewee_id,
            answers = answers.len(),
            auto_graded,
            "assessment submitted"
        );
        Ok(SubmissionReceipt {
            submission,
            answers,
        })
    }

    fn require_accepted_invitation(
        &self,
        assessment_id: AssessmentId,
        interviewee_id: UserId,
    ) -> Result<(), WorkflowError> {
        let now = self.clock.now();
        let accepted = self.store.find_invitations(InvitationFilter {
            status: Some(InvitationStatus::Accepted),
            ..InvitationFilter::pair(assessment_id, interviewee_id)
        })?;

        let mut usable = false;
        for invitation in &accepted {
            if invitation.is_past_expiry(now) {
                observe_expiry(self.store.as_ref(), invitation)?;
            } else {
                usable = true;
            }
        }

        if usable {
            Ok(())
        } else {
            warn!(
                assessment = %assessment_id,
                interviewee = %interviewee_id,
                "submission rejected without an accepted invitation"
            );
            Err(WorkflowError::forbidden(
                "an accepted invitation is required to submit this assessment",
            ))
        }
    }
}

fn duplicate_submission(assessment_id: AssessmentId, interviewee_id: UserId) -> WorkflowError {
    WorkflowError::conflict(format!(
        "interviewee {interviewee_id} has already submitted assessment {assessment_id}"
    ))
}

/// Checks the payload shape before any store access.
fn validate_entries(answers: Vec<AnswerDraft>) -> Result<Vec<(QuestionId, String)>, WorkflowError> {
    if answers.is_empty() {
        return Err(WorkflowError::validation("at least one answer is required"));
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(answers.len());
    for (index, draft) in answers.into_iter().enumerate() {
        let question_id = draft.question_id.ok_or_else(|| {
            WorkflowError::validation(format!("answer {} is missing its question id", index + 1))
        })?;
        let answer_text = draft
            .answer_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                WorkflowError::validation(format!(
                    "answer {} is missing its answer text",
                    index + 1
                ))
            })?;
        if !seen.insert(question_id) {
            return Err(WorkflowError::validation(format!(
                "question {question_id} is answered more than once"
            )));
        }
        entries.push((question_id, answer_text));
    }
    Ok(entries)
}
