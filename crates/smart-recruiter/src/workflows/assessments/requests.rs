use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AnswerDraft, AssessmentId, QuestionId, QuestionKind, SubmissionId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub time_limit: u32,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddQuestionRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// One or many interviewees for the same assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueInvitationsRequest {
    pub assessment_id: AssessmentId,
    pub interviewee_ids: Vec<UserId>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAssessmentRequest {
    pub assessment_id: AssessmentId,
    #[serde(default)]
    pub answers: Vec<AnswerDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub submission_id: SubmissionId,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
}
