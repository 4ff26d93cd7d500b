use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

record_id! {
    /// Identifier of a recruiter or interviewee account.
    UserId,
    AssessmentId,
    QuestionId,
    InvitationId,
    SubmissionId,
    AnswerId,
    FeedbackId,
}

/// Account role; fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Recruiter,
    Interviewee,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Interviewee => "interviewee",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Authenticated caller handed over by the session gate. Never trusted on its own: the
/// service re-reads the account on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub gender: Gender,
    /// Opaque value owned by the auth gate.
    pub credential_hash: String,
    pub company_name: Option<String>,
    pub consent: Option<bool>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registration payload; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub gender: Gender,
    #[serde(default)]
    pub credential_hash: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub consent: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub title: String,
    pub description: Option<String>,
    pub recruiter_id: UserId,
    /// Minutes allotted to a candidate.
    pub time_limit: u32,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssessment {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub recruiter_id: UserId,
    pub time_limit: u32,
    #[serde(default)]
    pub published: bool,
}

/// Question shape. Only multiple choice is auto-graded; the match in the scoring rules is
/// exhaustive over these variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        /// Choice label (e.g. "A") to display text.
        choices: BTreeMap<String, String>,
        /// Label of the correct choice.
        correct_answer: String,
    },
    Subjective,
    Coding {
        #[serde(default)]
        reference_solution: Option<String>,
    },
}

impl QuestionKind {
    pub const fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::Subjective => "subjective",
            QuestionKind::Coding { .. } => "coding",
        }
    }

    pub const fn is_auto_graded(&self) -> bool {
        matches!(self, QuestionKind::MultipleChoice { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub assessment_id: AssessmentId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Overrides the configured default weight for auto-graded answers.
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub assessment_id: AssessmentId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Assessment together with its ordered question set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentDetail {
    pub assessment: Assessment,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Completed,
    Expired,
}

impl InvitationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Completed => "completed",
            InvitationStatus::Expired => "expired",
        }
    }

    /// Pending and accepted invitations still occupy their (assessment, interviewee) slot.
    pub const fn is_active(self) -> bool {
        matches!(self, InvitationStatus::Pending | InvitationStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: InvitationId,
    pub assessment_id: AssessmentId,
    pub interviewee_id: UserId,
    pub status: InvitationStatus,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Status as observed at `now`. Active invitations past their expiry read as expired;
    /// completed is never overridden.
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status.is_active() && self.is_past_expiry(now) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map(|expiry| expiry < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvitation {
    pub assessment_id: AssessmentId,
    pub interviewee_id: UserId,
    pub status: InvitationStatus,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
    Graded,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub assessment_id: AssessmentId,
    pub interviewee_id: UserId,
    pub status: SubmissionStatus,
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Submission plus the answers persisted with it in the same unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub assessment_id: AssessmentId,
    pub interviewee_id: UserId,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub score: Option<f64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub answers: Vec<NewAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub submission_id: SubmissionId,
    pub question_id: QuestionId,
    pub answer_text: String,
    pub is_correct: Option<bool>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnswer {
    pub question_id: QuestionId,
    pub answer_text: String,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Raw answer entry as received from the caller, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnswerDraft {
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    #[serde(default)]
    pub answer_text: Option<String>,
}

impl AnswerDraft {
    pub fn new(question_id: QuestionId, answer_text: impl Into<String>) -> Self {
        Self {
            question_id: Some(question_id),
            answer_text: Some(answer_text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    pub submission_id: SubmissionId,
    /// `None` marks submission-level narrative feedback.
    pub question_id: Option<QuestionId>,
    pub recruiter_id: UserId,
    pub text: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub submission_id: SubmissionId,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    pub recruiter_id: UserId,
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
}
