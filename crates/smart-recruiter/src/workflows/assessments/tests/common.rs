use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::workflows::assessments::clock::Clock;
use crate::workflows::assessments::domain::{
    Answer, AnswerDraft, Assessment, AssessmentId, Feedback, Gender, Invitation, InvitationId,
    InvitationStatus, NewAssessment, NewFeedback, NewInvitation, NewQuestion, NewSubmission,
    NewUser, Notification, Principal, Question, QuestionId, QuestionKind, Role, Submission,
    SubmissionId, User, UserId,
};
use crate::workflows::assessments::memory::{InMemoryNotifications, InMemoryRecordStore};
use crate::workflows::assessments::repository::{
    InvitationFilter, NotificationError, NotificationPublisher, RecordStore, RepositoryError,
    ScoreUpdate, SubmissionFilter,
};
use crate::workflows::assessments::requests::{
    AddQuestionRequest, CreateAssessmentRequest, FeedbackRequest, IssueInvitationsRequest,
    SubmitAssessmentRequest,
};
use crate::workflows::assessments::service::{AssessmentWorkflowService, WorkflowConfig};
use crate::workflows::assessments::submissions::SubmissionReceipt;

pub(super) type TestService = AssessmentWorkflowService<InMemoryRecordStore, InMemoryNotifications>;

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn start() -> DateTime<Utc> {
    at(2025, 3, 15)
}

/// Clock the tests move by hand.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }

    pub(super) fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn principal(user: &User) -> Principal {
    Principal {
        id: user.id,
        role: user.role,
    }
}

pub(super) fn recruiter_profile(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: "Sarah".to_string(),
        last_name: "Mpengu".to_string(),
        email: format!("{username}@techcorp.example"),
        role: Role::Recruiter,
        gender: Gender::Female,
        credential_hash: "opaque".to_string(),
        company_name: Some("Tech Corp".to_string()),
        consent: None,
    }
}

pub(super) fn interviewee_profile(username: &str, gender: Gender) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: username.to_string(),
        last_name: "Candidate".to_string(),
        email: format!("{username}@mail.example"),
        role: Role::Interviewee,
        gender,
        credential_hash: "opaque".to_string(),
        company_name: None,
        consent: Some(true),
    }
}

pub(super) fn choice_kind(correct: &str) -> QuestionKind {
    let mut choices = BTreeMap::new();
    choices.insert("A".to_string(), "O(1)".to_string());
    choices.insert("B".to_string(), "O(log n)".to_string());
    choices.insert("C".to_string(), "O(n)".to_string());
    QuestionKind::MultipleChoice {
        choices,
        correct_answer: correct.to_string(),
    }
}

/// Service over fresh in-memory doubles with one recruiter, one assessment holding a
/// multiple choice question (correct "B") and a subjective question.
pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) store: Arc<InMemoryRecordStore>,
    pub(super) notifications: Arc<InMemoryNotifications>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) recruiter: User,
    pub(super) assessment: Assessment,
    pub(super) choice_question: Question,
    pub(super) essay_question: Question,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::titled("Real Backend Assessment")
    }

    pub(super) fn titled(title: &str) -> Self {
        Self::with_config(title, WorkflowConfig::default())
    }

    pub(super) fn with_config(title: &str, config: WorkflowConfig) -> Self {
        let store = Arc::new(InMemoryRecordStore::new());
        let notifications = Arc::new(InMemoryNotifications::default());
        let clock = Arc::new(ManualClock::new(start()));
        let service = AssessmentWorkflowService::with_clock(
            store.clone(),
            notifications.clone(),
            config,
            clock.clone(),
        );

        let recruiter = service
            .register_user(recruiter_profile("recruiter1"))
            .expect("recruiter registers");
        let assessment = service
            .create_assessment(
                Some(&principal(&recruiter)),
                CreateAssessmentRequest {
                    title: title.to_string(),
                    description: Some("Screening for backend engineers".to_string()),
                    time_limit: 60,
                    published: true,
                },
            )
            .expect("assessment created");
        let choice_question = service
            .add_question(
                Some(&principal(&recruiter)),
                assessment.id,
                AddQuestionRequest {
                    prompt: "Lookup cost of a balanced search tree?".to_string(),
                    kind: choice_kind("B"),
                    weight: None,
                },
            )
            .expect("choice question added");
        let essay_question = service
            .add_question(
                Some(&principal(&recruiter)),
                assessment.id,
                AddQuestionRequest {
                    prompt: "Explain the concept of recursion.".to_string(),
                    kind: QuestionKind::Subjective,
                    weight: None,
                },
            )
            .expect("essay question added");

        Self {
            service,
            store,
            notifications,
            clock,
            recruiter,
            assessment,
            choice_question,
            essay_question,
        }
    }

    pub(super) fn recruiter_principal(&self) -> Principal {
        principal(&self.recruiter)
    }

    pub(super) fn interviewee(&self, username: &str, gender: Gender) -> User {
        self.service
            .register_user(interviewee_profile(username, gender))
            .expect("interviewee registers")
    }

    pub(super) fn invite(&self, interviewee: &User, expiry: Option<DateTime<Utc>>) -> Invitation {
        self.service
            .issue_invitation(
                Some(&self.recruiter_principal()),
                self.assessment.id,
                interviewee.id,
                expiry,
            )
            .expect("invitation issued")
    }

    pub(super) fn invite_and_accept(&self, interviewee: &User) -> Invitation {
        let invitation = self.invite(interviewee, None);
        self.service
            .accept_invitation(Some(&principal(interviewee)), invitation.id)
            .expect("invitation accepted")
    }

    pub(super) fn submit(&self, interviewee: &User, choice: &str, essay: &str) -> SubmissionReceipt {
        self.service
            .submit(
                Some(&principal(interviewee)),
                SubmitAssessmentRequest {
                    assessment_id: self.assessment.id,
                    answers: vec![
                        AnswerDraft::new(self.choice_question.id, choice),
                        AnswerDraft::new(self.essay_question.id, essay),
                    ],
                },
            )
            .expect("submission accepted")
    }

    /// Another assessment by the same recruiter with a single subjective question.
    pub(super) fn extra_assessment(&self, title: &str) -> (Assessment, Question) {
        let assessment = self
            .service
            .create_assessment(
                Some(&self.recruiter_principal()),
                CreateAssessmentRequest {
                    title: title.to_string(),
                    description: None,
                    time_limit: 45,
                    published: true,
                },
            )
            .expect("extra assessment created");
        let question = self
            .service
            .add_question(
                Some(&self.recruiter_principal()),
                assessment.id,
                AddQuestionRequest {
                    prompt: "Describe a system you designed.".to_string(),
                    kind: QuestionKind::Subjective,
                    weight: None,
                },
            )
            .expect("extra question added");
        (assessment, question)
    }

    /// Invite, accept and submit one answer to `question` of `assessment`.
    pub(super) fn take(
        &self,
        interviewee: &User,
        assessment: &Assessment,
        question: &Question,
        answer: &str,
    ) -> SubmissionReceipt {
        let invitation = self
            .service
            .issue_invitation(
                Some(&self.recruiter_principal()),
                assessment.id,
                interviewee.id,
                None,
            )
            .expect("invitation issued");
        self.service
            .accept_invitation(Some(&principal(interviewee)), invitation.id)
            .expect("invitation accepted");
        self.service
            .submit(
                Some(&principal(interviewee)),
                SubmitAssessmentRequest {
                    assessment_id: assessment.id,
                    answers: vec![AnswerDraft::new(question.id, answer)],
                },
            )
            .expect("submission accepted")
    }

    /// Score every listed question of a submission and recompute it.
    pub(super) fn grade(
        &self,
        submission: SubmissionId,
        scores: &[(QuestionId, f64)],
    ) -> Submission {
        for (question_id, score) in scores {
            self.service
                .add_feedback(
                    Some(&self.recruiter_principal()),
                    FeedbackRequest {
                        submission_id: submission,
                        question_id: Some(*question_id),
                        text: "Reviewed.".to_string(),
                        score: Some(*score),
                    },
                )
                .expect("feedback recorded");
        }
        self.service
            .recompute_score(Some(&self.recruiter_principal()), submission)
            .expect("score recomputed")
    }

    pub(super) fn bulk_request(&self, interviewees: &[&User]) -> IssueInvitationsRequest {
        IssueInvitationsRequest {
            assessment_id: self.assessment.id,
            interviewee_ids: interviewees.iter().map(|user| user.id).collect(),
            expiry_date: None,
        }
    }

    pub(super) fn invitations_of(&self, interviewee: &User) -> Vec<Invitation> {
        self.store
            .find_invitations(InvitationFilter::pair(self.assessment.id, interviewee.id))
            .expect("query invitations")
    }

    pub(super) fn stored_invitation(&self, id: InvitationId) -> Invitation {
        self.store
            .fetch_invitation(id)
            .expect("fetch invitation")
            .expect("invitation exists")
    }

    pub(super) fn stored_submission(&self, id: SubmissionId) -> Submission {
        self.store
            .fetch_submission(id)
            .expect("fetch submission")
            .expect("submission exists")
    }

    pub(super) fn active_invitations(&self, interviewee: &User) -> usize {
        self.invitations_of(interviewee)
            .iter()
            .filter(|invitation| invitation.status.is_active())
            .count()
    }
}

/// Store whose every call fails as if the database were down.
#[derive(Default)]
pub(super) struct UnavailableStore;

fn down<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable(
        "connection refused by db-primary:5432".to_string(),
    ))
}

impl RecordStore for UnavailableStore {
    fn insert_user(&self, _user: NewUser) -> Result<User, RepositoryError> {
        down()
    }
    fn fetch_user(&self, _id: UserId) -> Result<Option<User>, RepositoryError> {
        down()
    }
    fn users_with_role(&self, _role: Role) -> Result<Vec<User>, RepositoryError> {
        down()
    }
    fn insert_assessment(&self, _assessment: NewAssessment) -> Result<Assessment, RepositoryError> {
        down()
    }
    fn fetch_assessment(&self, _id: AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        down()
    }
    fn update_assessment(&self, _assessment: Assessment) -> Result<(), RepositoryError> {
        down()
    }
    fn insert_question(&self, _question: NewQuestion) -> Result<Question, RepositoryError> {
        down()
    }
    fn questions_for(&self, _assessment: AssessmentId) -> Result<Vec<Question>, RepositoryError> {
        down()
    }
    fn insert_invitation(
        &self,
        _invitation: NewInvitation,
    ) -> Result<Invitation, RepositoryError> {
        down()
    }
    fn fetch_invitation(&self, _id: InvitationId) -> Result<Option<Invitation>, RepositoryError> {
        down()
    }
    fn transition_invitation(
        &self,
        _id: InvitationId,
        _from: InvitationStatus,
        _to: InvitationStatus,
    ) -> Result<Invitation, RepositoryError> {
        down()
    }
    fn find_invitations(
        &self,
        _filter: InvitationFilter,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        down()
    }
    fn insert_submission(
        &self,
        _submission: NewSubmission,
    ) -> Result<(Submission, Vec<Answer>), RepositoryError> {
        down()
    }
    fn fetch_submission(&self, _id: SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        down()
    }
    fn find_submissions(
        &self,
        _filter: SubmissionFilter,
    ) -> Result<Vec<Submission>, RepositoryError> {
        down()
    }
    fn answers_for(&self, _submission: SubmissionId) -> Result<Vec<Answer>, RepositoryError> {
        down()
    }
    fn commit_scores(&self, _update: ScoreUpdate) -> Result<Submission, RepositoryError> {
        down()
    }
    fn insert_feedback(&self, _feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        down()
    }
    fn feedback_for(&self, _submission: SubmissionId) -> Result<Vec<Feedback>, RepositoryError> {
        down()
    }
}

/// Publisher that rejects every notification.
#[derive(Default)]
pub(super) struct FailingNotifications {
    attempts: Mutex<usize>,
}

impl FailingNotifications {
    pub(super) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("attempt mutex poisoned")
    }
}

impl NotificationPublisher for FailingNotifications {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        *self.attempts.lock().expect("attempt mutex poisoned") += 1;
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

type Interleaved = Box<dyn FnOnce() + Send>;

/// Delegates to an in-memory store and runs a one-shot hook right before the first
/// `commit_scores`, so another writer can slip in between a scoring pass's reads and its
/// write.
pub(super) struct InterleavingStore {
    inner: Arc<InMemoryRecordStore>,
    before_commit: Mutex<Option<Interleaved>>,
}

impl InterleavingStore {
    pub(super) fn new(
        inner: Arc<InMemoryRecordStore>,
        before_commit: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            inner,
            before_commit: Mutex::new(Some(Box::new(before_commit))),
        }
    }
}

impl RecordStore for InterleavingStore {
    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.inner.insert_user(user)
    }
    fn fetch_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.fetch_user(id)
    }
    fn users_with_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        self.inner.users_with_role(role)
    }
    fn insert_assessment(&self, assessment: NewAssessment) -> Result<Assessment, RepositoryError> {
        self.inner.insert_assessment(assessment)
    }
    fn fetch_assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        self.inner.fetch_assessment(id)
    }
    fn update_assessment(&self, assessment: Assessment) -> Result<(), RepositoryError> {
        self.inner.update_assessment(assessment)
    }
    fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        self.inner.insert_question(question)
    }
    fn questions_for(&self, assessment: AssessmentId) -> Result<Vec<Question>, RepositoryError> {
        self.inner.questions_for(assessment)
    }
    fn insert_invitation(&self, invitation: NewInvitation) -> Result<Invitation, RepositoryError> {
        self.inner.insert_invitation(invitation)
    }
    fn fetch_invitation(&self, id: InvitationId) -> Result<Option<Invitation>, RepositoryError> {
        self.inner.fetch_invitation(id)
    }
    fn transition_invitation(
        &self,
        id: InvitationId,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation, RepositoryError> {
        self.inner.transition_invitation(id, from, to)
    }
    fn find_invitations(
        &self,
        filter: InvitationFilter,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        self.inner.find_invitations(filter)
    }
    fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<(Submission, Vec<Answer>), RepositoryError> {
        self.inner.insert_submission(submission)
    }
    fn fetch_submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        self.inner.fetch_submission(id)
    }
    fn find_submissions(
        &self,
        filter: SubmissionFilter,
    ) -> Result<Vec<Submission>, RepositoryError> {
        self.inner.find_submissions(filter)
    }
    fn answers_for(&self, submission: SubmissionId) -> Result<Vec<Answer>, RepositoryError> {
        self.inner.answers_for(submission)
    }
    fn commit_scores(&self, update: ScoreUpdate) -> Result<Submission, RepositoryError> {
        let hook = self
            .before_commit
            .lock()
            .expect("hook mutex poisoned")
            .take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.commit_scores(update)
    }
    fn insert_feedback(&self, feedback: NewFeedback) -> Result<Feedback, RepositoryError> {
        self.inner.insert_feedback(feedback)
    }
    fn feedback_for(&self, submission: SubmissionId) -> Result<Vec<Feedback>, RepositoryError> {
        self.inner.feedback_for(submission)
    }
}
