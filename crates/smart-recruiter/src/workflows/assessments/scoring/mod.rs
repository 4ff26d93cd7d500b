mod config;
pub(crate) mod rules;

pub use config::{ScoringConfig, DEFAULT_QUESTION_WEIGHT};

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{
    Feedback, InvitationStatus, NewFeedback, Notification, NotificationKind, QuestionId, Role,
    Submission, SubmissionId, SubmissionStatus, UserId,
};
use super::error::WorkflowError;
use super::repository::{
    deliver, InvitationFilter, NotificationPublisher, RecordStore, ScoreSnapshot, ScoreUpdate,
    SubmissionFilter,
};

/// Scoring passes tried before a lost race is reported as a conflict.
const MAX_SCORE_ATTEMPTS: usize = 3;

/// Applies recruiter feedback and derives submission and candidate scores.
pub struct ScoringEngine<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    config: ScoringConfig,
}

impl<S, N> ScoringEngine<S, N>
where
    S: RecordStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: ScoringConfig) -> Self {
        Self {
            store,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Append a feedback row. Answer rows are left untouched until the next recompute.
    pub fn add_feedback(
        &self,
        submission_id: SubmissionId,
        recruiter_id: UserId,
        question_id: Option<QuestionId>,
        text: &str,
        score: Option<f64>,
    ) -> Result<Feedback, WorkflowError> {
        let is_recruiter = self
            .store
            .fetch_user(recruiter_id)?
            .map(|user| user.role == Role::Recruiter)
            .unwrap_or(false);
        if !is_recruiter {
            return Err(WorkflowError::forbidden("only recruiters can leave feedback"));
        }

        if text.trim().is_empty() {
            return Err(WorkflowError::validation("feedback text is required"));
        }
        if let Some(value) = score {
            if !value.is_finite() || value < 0.0 {
                return Err(WorkflowError::validation(
                    "feedback score must be a non-negative number",
                ));
            }
        }

        let submission = self
            .store
            .fetch_submission(submission_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("submission {submission_id}")))?;

        if let Some(question_id) = question_id {
            let belongs = self
                .store
                .questions_for(submission.assessment_id)?
                .iter()
                .any(|question| question.id == question_id);
            if !belongs {
                return Err(WorkflowError::validation(format!(
                    "question {question_id} is not part of assessment {}",
                    submission.assessment_id
                )));
            }
        }

        let feedback = self.store.insert_feedback(NewFeedback {
            submission_id,
            question_id,
            recruiter_id,
            text: text.trim().to_string(),
            score,
        })?;

        info!(
            submission = %submission_id,
            recruiter = %recruiter_id,
            question = ?question_id,
            "feedback recorded"
        );
        Ok(feedback)
    }

    /// Fold question feedback into answer scores and refresh the submission aggregate.
    ///
    /// Once every answer carries a score the submission moves to graded and its accepted
    /// invitation to completed, in the same store unit. Repeated calls without new
    /// feedback write nothing. A commit that loses a race with another scoring pass is
    /// recomputed from fresh reads.
    pub fn recompute_submission_score(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Submission, WorkflowError> {
        let mut attempt = 1;
        loop {
            match self.fold_scores(submission_id) {
                Err(WorkflowError::Conflict(reason)) if attempt < MAX_SCORE_ATTEMPTS => {
                    debug!(submission = %submission_id, attempt, %reason, "score commit raced");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn fold_scores(&self, submission_id: SubmissionId) -> Result<Submission, WorkflowError> {
        let submission = self
            .store
            .fetch_submission(submission_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("submission {submission_id}")))?;
        let answers = self.store.answers_for(submission_id)?;
        let feedback = self.store.feedback_for(submission_id)?;

        let effective = rules::effective_scores(&answers, &feedback);
        let answer_scores: Vec<_> = answers
            .iter()
            .zip(&effective)
            .filter_map(|(answer, (answer_id, score))| match score {
                Some(value) if answer.score != Some(*value) => Some((*answer_id, *value)),
                _ => None,
            })
            .collect();
        let aggregate = rules::mean(effective.iter().filter_map(|(_, score)| *score));
        let fully_scored =
            !effective.is_empty() && effective.iter().all(|(_, score)| score.is_some());

        let grading = submission.status == SubmissionStatus::Submitted && fully_scored;
        let status = if grading {
            SubmissionStatus::Graded
        } else {
            submission.status
        };

        if answer_scores.is_empty() && aggregate == submission.score && status == submission.status
        {
            debug!(submission = %submission_id, "score unchanged");
            return Ok(submission);
        }

        let complete_invitation = if grading {
            let accepted = self.store.find_invitations(InvitationFilter {
                status: Some(InvitationStatus::Accepted),
                ..InvitationFilter::pair(submission.assessment_id, submission.interviewee_id)
            })?;
            if accepted.is_empty() {
                warn!(
                    submission = %submission_id,
                    "graded submission has no accepted invitation to complete"
                );
            }
            accepted.first().map(|invitation| invitation.id)
        } else {
            None
        };

        debug!(
            submission = %submission_id,
            changed_answers = answer_scores.len(),
            ?aggregate,
            "committing scores"
        );
        let updated = self.store.commit_scores(ScoreUpdate {
            submission_id,
            observed: ScoreSnapshot {
                status: submission.status,
                aggregate: submission.score,
                answer_scores: answers
                    .iter()
                    .map(|answer| (answer.id, answer.score))
                    .collect(),
            },
            answer_scores,
            aggregate,
            status,
            complete_invitation,
        })?;

        if grading {
            info!(
                submission = %submission_id,
                score = ?updated.score,
                "submission graded"
            );
            let title = self
                .store
                .fetch_assessment(updated.assessment_id)?
                .map(|assessment| assessment.title)
                .unwrap_or_else(|| format!("assessment {}", updated.assessment_id));
            deliver(
                self.notifications.as_ref(),
                Notification {
                    user_id: updated.interviewee_id,
                    kind: NotificationKind::Info,
                    message: format!("Your assessment '{title}' has been graded."),
                },
            );
        }

        Ok(updated)
    }

    /// Mean of the interviewee's scored submissions, rounded to two decimals. No scored
    /// submissions yields 0, which qualification treats as "not qualified".
    pub fn average_score(&self, interviewee_id: UserId) -> Result<f64, WorkflowError> {
        average_score(self.store.as_ref(), interviewee_id)
    }
}

pub(crate) fn average_score<S>(store: &S, interviewee_id: UserId) -> Result<f64, WorkflowError>
where
    S: RecordStore + ?Sized,
{
    let submissions = store.find_submissions(SubmissionFilter::interviewee(interviewee_id))?;
    let average = rules::mean(submissions.iter().filter_map(|submission| submission.score));
    Ok(average.map(rules::round_two).unwrap_or(0.0))
}
