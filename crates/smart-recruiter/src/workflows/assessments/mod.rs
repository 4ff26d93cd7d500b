//! Assessment hiring workflow: invitations, submissions, scoring and analytics over a
//! pluggable record store.

pub mod analytics;
pub mod catalog;
pub mod clock;
pub mod domain;
pub mod error;
pub mod invitations;
pub mod memory;
pub mod repository;
pub mod requests;
pub mod scoring;
pub mod service;
pub mod submissions;

#[cfg(test)]
mod tests;

pub use analytics::{
    AnalyticsAggregator, AnalyticsConfig, GenderComposition, MonthlyPerformance,
    QualificationEntry, QualificationReport, QualificationStatus,
    DEFAULT_QUALIFICATION_THRESHOLD,
};
pub use catalog::{trial_assessment, AssessmentCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Answer, AnswerDraft, AnswerId, Assessment, AssessmentDetail, AssessmentId, Feedback,
    FeedbackId, Gender, Invitation, InvitationId, InvitationStatus, NewAssessment, NewQuestion,
    NewUser, Notification, NotificationKind, Principal, Question, QuestionId, QuestionKind, Role,
    Submission, SubmissionId, SubmissionStatus, User, UserId,
};
pub use error::{ErrorKind, ErrorView, WorkflowError};
pub use invitations::{InvitationLifecycle, IssueOutcome, IssueOutcomeView};
pub use memory::{InMemoryNotifications, InMemoryRecordStore};
pub use repository::{
    InvitationFilter, NotificationError, NotificationPublisher, RecordStore, RepositoryError,
    ScoreSnapshot, ScoreUpdate, SubmissionFilter,
};
pub use requests::{
    AddQuestionRequest, CreateAssessmentRequest, FeedbackRequest, IssueInvitationsRequest,
    SubmitAssessmentRequest,
};
pub use scoring::{ScoringConfig, ScoringEngine, DEFAULT_QUESTION_WEIGHT};
pub use service::{AssessmentWorkflowService, WorkflowConfig};
pub use submissions::{SubmissionIntake, SubmissionReceipt};
