use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::analytics::{
    AnalyticsAggregator, AnalyticsConfig, GenderComposition, MonthlyPerformance,
    QualificationReport,
};
use super::catalog::{trial_assessment, AssessmentCatalog};
use super::clock::{Clock, SystemClock};
use super::domain::{
    Assessment, AssessmentDetail, AssessmentId, Feedback, Invitation, InvitationId, NewAssessment,
    NewQuestion, NewUser, Principal, Question, Role, Submission, SubmissionId, User, UserId,
};
use super::error::WorkflowError;
use super::invitations::{InvitationLifecycle, IssueOutcome};
use super::repository::{NotificationPublisher, RecordStore};
use super::requests::{
    AddQuestionRequest, CreateAssessmentRequest, FeedbackRequest, IssueInvitationsRequest,
    SubmitAssessmentRequest,
};
use super::scoring::{ScoringConfig, ScoringEngine};
use super::submissions::{SubmissionIntake, SubmissionReceipt};

/// Policy knobs for the whole workflow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub scoring: ScoringConfig,
    pub analytics: AnalyticsConfig,
}

/// Entry point for the request-handling layer: one method per operation, each
/// re-validating the caller against the store before delegating.
pub struct AssessmentWorkflowService<S, N> {
    store: Arc<S>,
    catalog: AssessmentCatalog<S>,
    invitations: InvitationLifecycle<S, N>,
    intake: SubmissionIntake<S>,
    scoring: ScoringEngine<S, N>,
    analytics: AnalyticsAggregator<S>,
}

impl<S, N> AssessmentWorkflowService<S, N>
where
    S: RecordStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: WorkflowConfig) -> Self {
        Self::with_clock(store, notifications, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        notifications: Arc<N>,
        config: WorkflowConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let WorkflowConfig { scoring, analytics } = config;

        Self {
            catalog: AssessmentCatalog::new(store.clone()),
            invitations: InvitationLifecycle::new(
                store.clone(),
                notifications.clone(),
                clock.clone(),
            ),
            intake: SubmissionIntake::new(store.clone(), clock, scoring.clone()),
            scoring: ScoringEngine::new(store.clone(), notifications, scoring),
            analytics: AnalyticsAggregator::new(store.clone(), analytics),
            store,
        }
    }

    /// Sign-up; the only operation without a principal.
    pub fn register_user(&self, user: NewUser) -> Result<User, WorkflowError> {
        self.catalog.register_user(user)
    }

    pub fn create_assessment(
        &self,
        principal: Option<&Principal>,
        request: CreateAssessmentRequest,
    ) -> Result<Assessment, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.catalog.create_assessment(NewAssessment {
            title: request.title,
            description: request.description,
            recruiter_id: recruiter.id,
            time_limit: request.time_limit,
            published: request.published,
        })
    }

    pub fn set_published(
        &self,
        principal: Option<&Principal>,
        assessment_id: AssessmentId,
        published: bool,
    ) -> Result<Assessment, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.catalog
            .set_published(assessment_id, recruiter.id, published)
    }

    pub fn add_question(
        &self,
        principal: Option<&Principal>,
        assessment_id: AssessmentId,
        request: AddQuestionRequest,
    ) -> Result<Question, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.catalog.add_question(
            recruiter.id,
            NewQuestion {
                assessment_id,
                prompt: request.prompt,
                kind: request.kind,
                weight: request.weight,
            },
        )
    }

    pub fn assessment_detail(
        &self,
        principal: Option<&Principal>,
        assessment_id: AssessmentId,
    ) -> Result<AssessmentDetail, WorkflowError> {
        self.authenticate(principal)?;
        self.catalog.assessment_detail(assessment_id)
    }

    pub fn trial_assessment(
        &self,
        principal: Option<&Principal>,
    ) -> Result<AssessmentDetail, WorkflowError> {
        self.authenticate(principal)?;
        Ok(trial_assessment())
    }

    /// Issue invitations on an assessment the calling recruiter owns.
    pub fn issue_invitations(
        &self,
        principal: Option<&Principal>,
        request: IssueInvitationsRequest,
    ) -> Result<Vec<IssueOutcome>, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.require_owner(request.assessment_id, recruiter.id)?;
        self.invitations.issue_bulk(
            request.assessment_id,
            &request.interviewee_ids,
            request.expiry_date,
        )
    }

    pub fn issue_invitation(
        &self,
        principal: Option<&Principal>,
        assessment_id: AssessmentId,
        interviewee_id: UserId,
        expiry_date: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Invitation, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.require_owner(assessment_id, recruiter.id)?;
        self.invitations
            .issue(assessment_id, interviewee_id, expiry_date)
    }

    pub fn accept_invitation(
        &self,
        principal: Option<&Principal>,
        invitation_id: InvitationId,
    ) -> Result<Invitation, WorkflowError> {
        let interviewee = self.authenticate(principal)?;
        self.invitations.accept(invitation_id, interviewee.id)
    }

    pub fn my_invitations(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<Invitation>, WorkflowError> {
        let interviewee = self.authorize(principal, Role::Interviewee)?;
        self.invitations.invitations_for(interviewee.id)
    }

    pub fn my_assessments(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<Assessment>, WorkflowError> {
        let interviewee = self.authorize(principal, Role::Interviewee)?;
        self.catalog.assessments_for(interviewee.id)
    }

    pub fn accepted_interviewees(
        &self,
        principal: Option<&Principal>,
        assessment_id: AssessmentId,
    ) -> Result<Vec<User>, WorkflowError> {
        self.authorize(principal, Role::Recruiter)?;
        self.catalog.accepted_interviewees(assessment_id)
    }

    pub fn submit(
        &self,
        principal: Option<&Principal>,
        request: SubmitAssessmentRequest,
    ) -> Result<SubmissionReceipt, WorkflowError> {
        let interviewee = self.authorize(principal, Role::Interviewee)?;
        self.intake
            .submit(request.assessment_id, interviewee.id, request.answers)
    }

    pub fn add_feedback(
        &self,
        principal: Option<&Principal>,
        request: FeedbackRequest,
    ) -> Result<Feedback, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.require_submission_owner(request.submission_id, recruiter.id)?;
        self.scoring.add_feedback(
            request.submission_id,
            recruiter.id,
            request.question_id,
            &request.text,
            request.score,
        )
    }

    pub fn recompute_score(
        &self,
        principal: Option<&Principal>,
        submission_id: SubmissionId,
    ) -> Result<Submission, WorkflowError> {
        let recruiter = self.authorize(principal, Role::Recruiter)?;
        self.require_submission_owner(submission_id, recruiter.id)?;
        self.scoring.recompute_submission_score(submission_id)
    }

    /// Feedback is visible to the submitting interviewee and to recruiters.
    pub fn feedback_for(
        &self,
        principal: Option<&Principal>,
        submission_id: SubmissionId,
    ) -> Result<Vec<Feedback>, WorkflowError> {
        let caller = self.authenticate(principal)?;
        let submission = self
            .store
            .fetch_submission(submission_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("submission {submission_id}")))?;

        if caller.role != Role::Recruiter && caller.id != submission.interviewee_id {
            return Err(WorkflowError::forbidden(
                "you are not authorized to view this feedback",
            ));
        }
        Ok(self.store.feedback_for(submission_id)?)
    }

    pub fn average_score(
        &self,
        principal: Option<&Principal>,
        interviewee_id: UserId,
    ) -> Result<f64, WorkflowError> {
        let caller = self.authenticate(principal)?;
        if caller.role != Role::Recruiter && caller.id != interviewee_id {
            return Err(WorkflowError::forbidden(
                "interviewees can only view their own average",
            ));
        }
        self.scoring.average_score(interviewee_id)
    }

    pub fn qualification_report(
        &self,
        principal: Option<&Principal>,
    ) -> Result<QualificationReport, WorkflowError> {
        self.authenticate(principal)?;
        self.analytics.qualification_report()
    }

    pub fn gender_composition(
        &self,
        principal: Option<&Principal>,
    ) -> Result<GenderComposition, WorkflowError> {
        self.authenticate(principal)?;
        self.analytics.gender_composition()
    }

    pub fn monthly_performance(
        &self,
        principal: Option<&Principal>,
    ) -> Result<Vec<MonthlyPerformance>, WorkflowError> {
        self.authenticate(principal)?;
        self.analytics.monthly_performance()
    }

    /// Resolve the principal to its current account. A claim whose role no longer matches
    /// the stored account is rejected.
    fn authenticate(&self, principal: Option<&Principal>) -> Result<User, WorkflowError> {
        let principal = principal.ok_or(WorkflowError::Unauthenticated)?;
        let user = self
            .store
            .fetch_user(principal.id)?
            .ok_or(WorkflowError::Unauthenticated)?;

        if user.role != principal.role {
            warn!(
                user = %user.id,
                claimed = principal.role.label(),
                stored = user.role.label(),
                "stale principal role"
            );
            return Err(WorkflowError::forbidden(
                "principal role does not match the account",
            ));
        }
        Ok(user)
    }

    fn authorize(&self, principal: Option<&Principal>, role: Role) -> Result<User, WorkflowError> {
        let user = self.authenticate(principal)?;
        if user.role != role {
            return Err(WorkflowError::forbidden(format!(
                "this action requires the {} role",
                role.label()
            )));
        }
        Ok(user)
    }

    /// Only the recruiter owning the submission's assessment may grade it.
    fn require_submission_owner(
        &self,
        submission_id: SubmissionId,
        recruiter_id: UserId,
    ) -> Result<(), WorkflowError> {
        let submission = self
            .store
            .fetch_submission(submission_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("submission {submission_id}")))?;
        self.require_owner(submission.assessment_id, recruiter_id)
    }

    fn require_owner(
        &self,
        assessment_id: AssessmentId,
        recruiter_id: UserId,
    ) -> Result<(), WorkflowError> {
        let assessment = self
            .store
            .fetch_assessment(assessment_id)?
            .ok_or_else(|| WorkflowError::not_found(format!("assessment {assessment_id}")))?;
        if assessment.recruiter_id != recruiter_id {
            return Err(WorkflowError::forbidden(format!(
                "assessment {assessment_id} belongs to another recruiter"
            )));
        }
        Ok(())
    }
}
