use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    Answer, AnswerId, Assessment, AssessmentId, Feedback, Invitation, InvitationId,
    InvitationStatus, NewAssessment, NewFeedback, NewInvitation, NewQuestion, NewSubmission,
    NewUser, Notification, Question, Role, Submission, SubmissionId, SubmissionStatus, User,
    UserId,
};

/// Durable record storage consumed by the workflows.
///
/// Every method is one atomic unit. Implementations must enforce the uniqueness rules
/// themselves (one active invitation per assessment/interviewee pair, one submission per
/// pair, unique username and email) so that concurrent callers racing on the same key see
/// exactly one success and `RepositoryError::Conflict` for the rest.
pub trait RecordStore: Send + Sync {
    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;

    fn insert_assessment(&self, assessment: NewAssessment) -> Result<Assessment, RepositoryError>;
    fn fetch_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, RepositoryError>;
    fn update_assessment(&self, assessment: Assessment) -> Result<(), RepositoryError>;
    fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError>;
    /// Questions of an assessment in insertion order.
    fn questions_for(&self, assessment: AssessmentId) -> Result<Vec<Question>, RepositoryError>;

    /// Fails with `Conflict` when an active invitation already holds the pair.
    fn insert_invitation(&self, invitation: NewInvitation)
        -> Result<Invitation, RepositoryError>;
    fn fetch_invitation(&self, id: InvitationId) -> Result<Option<Invitation>, RepositoryError>;
    /// Compare-and-swap on the stored status. Fails with `NotFound` when no invitation with
    /// `id` is currently in `from`.
    fn transition_invitation(
        &self,
        id: InvitationId,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation, RepositoryError>;
    fn find_invitations(&self, filter: InvitationFilter)
        -> Result<Vec<Invitation>, RepositoryError>;

    /// Persists the submission and all of its answers, or nothing. Fails with `Conflict`
    /// when the pair already has a submission.
    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<(Submission, Vec<Answer>), RepositoryError>;
    fn fetch_submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    fn find_submissions(&self, filter: SubmissionFilter)
        -> Result<Vec<Submission>, RepositoryError>;
    fn answers_for(&self, submission: SubmissionId) -> Result<Vec<Answer>, RepositoryError>;
    /// Applies answer scores, the aggregate and the status change, plus the optional
    /// invitation completion, as one unit. Fails with `Conflict` when the stored submission
    /// or its answers no longer match the values the update was computed from.
    fn commit_scores(&self, update: ScoreUpdate) -> Result<Submission, RepositoryError>;

    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError>;
    /// Feedback rows in insertion order.
    fn feedback_for(&self, submission: SubmissionId) -> Result<Vec<Feedback>, RepositoryError>;
}

/// Predicate for invitation lookups; unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvitationFilter {
    pub assessment: Option<AssessmentId>,
    pub interviewee: Option<UserId>,
    pub status: Option<InvitationStatus>,
}

impl InvitationFilter {
    pub fn pair(assessment: AssessmentId, interviewee: UserId) -> Self {
        Self {
            assessment: Some(assessment),
            interviewee: Some(interviewee),
            status: None,
        }
    }

    pub fn matches(&self, invitation: &Invitation) -> bool {
        self.assessment
            .map_or(true, |id| invitation.assessment_id == id)
            && self
                .interviewee
                .map_or(true, |id| invitation.interviewee_id == id)
            && self.status.map_or(true, |status| invitation.status == status)
    }
}

/// Predicate for submission lookups; unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub assessment: Option<AssessmentId>,
    pub interviewee: Option<UserId>,
}

impl SubmissionFilter {
    pub fn pair(assessment: AssessmentId, interviewee: UserId) -> Self {
        Self {
            assessment: Some(assessment),
            interviewee: Some(interviewee),
        }
    }

    pub fn interviewee(interviewee: UserId) -> Self {
        Self {
            assessment: None,
            interviewee: Some(interviewee),
        }
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.assessment
            .map_or(true, |id| submission.assessment_id == id)
            && self
                .interviewee
                .map_or(true, |id| submission.interviewee_id == id)
    }
}

/// Result of a scoring pass, written back in a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub submission_id: SubmissionId,
    /// State the pass was computed from; the commit is rejected if the store moved on.
    pub observed: ScoreSnapshot,
    pub answer_scores: Vec<(AnswerId, f64)>,
    pub aggregate: Option<f64>,
    pub status: SubmissionStatus,
    /// Accepted invitation to move to completed alongside grading.
    pub complete_invitation: Option<InvitationId>,
}

/// Submission status, aggregate and per-answer scores as read by a scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub status: SubmissionStatus,
    pub aggregate: Option<f64>,
    pub answer_scores: Vec<(AnswerId, Option<f64>)>,
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("uniqueness constraint violated: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (in-app inbox, e-mail adapter, ...).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Publishes after a committed transition; delivery failures are logged, never propagated.
pub(crate) fn deliver<N>(publisher: &N, notification: Notification)
where
    N: NotificationPublisher + ?Sized,
{
    let user_id = notification.user_id;
    if let Err(error) = publisher.publish(notification) {
        warn!(%user_id, %error, "notification delivery failed");
    }
}
